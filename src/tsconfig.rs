//! Locating and reading compiler configuration files.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{LibpackError, Result};
use crate::script_target::ScriptTarget;

/// Conventional compiler config names, in lookup order.
pub const CONFIG_FILE_NAMES: [&str; 5] = [
    "tsconfig-build.json",
    "tsconfig.build.json",
    "tsconfig.lib.json",
    "tsconfig-lib.json",
    "tsconfig.json",
];

/// Path-valued compiler options, resolved against the file that declares them.
const PATH_OPTIONS: [&str; 3] = ["rootDir", "outDir", "baseUrl"];

/// Guards against `extends` cycles.
const MAX_EXTENDS_DEPTH: usize = 16;

/// A compiler configuration with its `extends` chain merged in.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub path: PathBuf,
    pub compiler_options: Map<String, Value>,
    pub angular_compiler_options: Option<Map<String, Value>>,
    /// Absolute paths of the `files` list.
    pub files: Vec<PathBuf>,
}

impl CompilerConfig {
    /// Walk up from `start` and return the first conventional config file found.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            for name in CONFIG_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
            dir = current.parent();
        }
        None
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_depth(path, 0)
    }

    fn load_with_depth(path: &Path, depth: usize) -> Result<Self> {
        if depth > MAX_EXTENDS_DEPTH {
            return Err(LibpackError::parse_error(path, "compiler config `extends` chain is too deep"));
        }

        let content = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
        let raw: Value = json5::from_str(&content).map_err(|e| LibpackError::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        let Value::Object(raw) = raw else {
            return Err(LibpackError::parse_error(path, "compiler config must be a JSON object"));
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut config = match raw.get("extends").and_then(Value::as_str) {
            Some(parent) if parent.starts_with('.') => {
                let mut parent_path = dir.join(parent);
                if parent_path.extension().is_none() {
                    parent_path.set_extension("json");
                }
                debug!("{} extends {}", path.display(), parent_path.display());
                Self::load_with_depth(&crate::paths::normalize(&parent_path), depth + 1)?
            }
            Some(parent) => {
                debug!("Ignoring package-based extends '{}' in {}", parent, path.display());
                Self::empty(path)
            }
            None => Self::empty(path),
        };
        config.path = path.to_path_buf();

        if let Some(Value::Object(options)) = raw.get("compilerOptions") {
            for (key, value) in options {
                let value = match (PATH_OPTIONS.contains(&key.as_str()), value.as_str()) {
                    (true, Some(p)) => Value::String(
                        crate::paths::normalize(&dir.join(p)).to_string_lossy().into_owned(),
                    ),
                    _ => value.clone(),
                };
                config.compiler_options.insert(key.clone(), value);
            }
        }

        if let Some(Value::Object(options)) = raw.get("angularCompilerOptions") {
            let merged = config.angular_compiler_options.get_or_insert_with(Map::new);
            for (key, value) in options {
                merged.insert(key.clone(), value.clone());
            }
        }

        if let Some(Value::Array(files)) = raw.get("files") {
            config.files = files
                .iter()
                .filter_map(Value::as_str)
                .map(|f| crate::paths::normalize(&dir.join(f)))
                .collect();
        }

        Ok(config)
    }

    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            compiler_options: Map::new(),
            angular_compiler_options: None,
            files: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn script_target(&self) -> Option<ScriptTarget> {
        self.compiler_options
            .get("target")
            .and_then(Value::as_str)
            .and_then(|t| t.parse().ok())
    }

    pub fn declaration(&self) -> bool {
        self.bool_option("declaration")
    }

    /// Directory the compiled output tree mirrors.
    pub fn source_root(&self) -> PathBuf {
        if let Some(root_dir) = self.compiler_options.get("rootDir").and_then(Value::as_str) {
            return PathBuf::from(root_dir);
        }
        if let Some(parent) = self.files.first().and_then(|f| f.parent()) {
            return parent.to_path_buf();
        }
        self.dir().to_path_buf()
    }

    /// Configs carrying `angularCompilerOptions` need the ahead-of-time compiler.
    pub fn is_aot(&self) -> bool {
        self.angular_compiler_options.is_some()
    }

    pub fn emits_metadata(&self) -> bool {
        self.is_aot() && !self.angular_bool("skipMetadataEmit")
    }

    pub fn flat_module_out_file(&self) -> Option<String> {
        self.angular_compiler_options
            .as_ref()
            .and_then(|o| o.get("flatModuleOutFile"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn flat_module_id(&self) -> Option<String> {
        self.angular_compiler_options
            .as_ref()
            .and_then(|o| o.get("flatModuleId"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Stem of the module that re-exports the package's public API.
    pub fn entry_stem(&self) -> String {
        if let Some(flat) = self.flat_module_out_file() {
            return crate::paths::file_stem(Path::new(&flat));
        }
        if let Some(first) = self.files.first() {
            let name = first.to_string_lossy();
            let name = name.strip_suffix(".d.ts").unwrap_or(name.as_ref());
            return crate::paths::file_stem(Path::new(name));
        }
        let root = self.source_root();
        if root.join("public_api.ts").is_file() {
            "public_api".to_string()
        } else {
            "index".to_string()
        }
    }

    /// Entry module path relative to the source root, without extension.
    pub fn entry_relative(&self) -> PathBuf {
        let stem = self.entry_stem();
        if self.flat_module_out_file().is_none() {
            if let Some(first) = self.files.first() {
                let rel = first.strip_prefix(self.source_root()).unwrap_or(first);
                return rel.with_file_name(&stem);
            }
        }
        PathBuf::from(stem)
    }

    fn bool_option(&self, key: &str) -> bool {
        self.compiler_options
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn angular_bool(&self, key: &str) -> bool {
        self.angular_compiler_options
            .as_ref()
            .and_then(|o| o.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
