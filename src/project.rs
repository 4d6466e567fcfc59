//! The declarative library project description consumed by the pipeline.
//!
//! Project files are camelCase JSON. [`LibraryProjectConfig::load`] reads one
//! and resolves every relative path against the file's directory, so the
//! stage runners only ever see absolute paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{LibpackError, Result};
use crate::script_target::{ModuleFormat, ScriptTarget};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryProjectConfig {
    /// Project root; relative to the project file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Output directory; may contain package tokens.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// The library's own package manifest.
    #[serde(default = "default_package_json")]
    pub package_json: PathBuf,

    /// Workspace manifest used to backfill metadata; auto-detected when unset.
    #[serde(default)]
    pub root_package_json: Option<PathBuf>,

    /// Where the synthesized manifest goes; defaults to the output path.
    #[serde(default)]
    pub package_json_out_dir: Option<PathBuf>,

    /// Version override; otherwise taken from the root or project manifest.
    #[serde(default)]
    pub version: Option<String>,

    /// Remove the output directory before building.
    #[serde(default)]
    pub clean: bool,

    /// Files copied verbatim into the output root.
    #[serde(default)]
    pub copy: Vec<PathBuf>,

    /// Banner prepended by the graph bundler; supports package tokens, `[version]` and `[current-year]`.
    #[serde(default)]
    pub banner: Option<String>,

    /// Emit and re-chain source maps; the tool config decides when unset.
    #[serde(default)]
    pub source_map: Option<bool>,

    /// Global stylesheets compiled into the output root.
    #[serde(default)]
    pub styles: Vec<StyleEntry>,

    #[serde(default)]
    pub style_preprocessor_options: StylePreprocessorOptions,

    /// Project-wide externals used by bundles that do not declare their own.
    #[serde(default)]
    pub externals: Option<Vec<ExternalEntry>>,

    #[serde(default, rename = "includeDefaultAngularAndRxJsGlobals")]
    pub include_default_angular_and_rxjs_globals: Option<bool>,

    #[serde(default)]
    pub ts_transpilations: Vec<TranspilationTarget>,

    #[serde(default)]
    pub bundles: Vec<BundleTarget>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePreprocessorOptions {
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleEntry {
    pub input: PathBuf,
    /// Output file relative to the output root; `<input stem>.css` when unset.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    Tsc,
    Ngc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspilationTarget {
    /// Compiler configuration; inherited from the previous target when unset.
    #[serde(default)]
    pub ts_config: Option<PathBuf>,

    /// Capability tier; taken from the compiler configuration when unset.
    #[serde(default)]
    pub target: Option<ScriptTarget>,

    #[serde(default)]
    pub declaration: Option<bool>,

    /// Defaults to `<output>/esm<tier>`.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Force the plain or ahead-of-time compiler.
    #[serde(default)]
    pub compiler: Option<CompilerKind>,

    #[serde(default = "default_true")]
    pub enable_resource_inlining: bool,

    #[serde(default)]
    pub move_typings_and_metadata_to_root_out_dir: bool,

    #[serde(default)]
    pub re_export_typings_and_metadata_to_root_out_dir: bool,

    #[serde(default = "default_true")]
    pub replace_version_placeholder: bool,

    #[serde(default)]
    pub i18n_file: Option<PathBuf>,

    #[serde(default)]
    pub i18n_format: Option<String>,

    #[serde(default)]
    pub locale: Option<String>,

    #[serde(default)]
    pub missing_translation: Option<String>,
}

/// How a bundle target finds its entry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryRoot {
    /// `entry` relative to the project root
    #[default]
    Root,
    /// The output file of the previous bundle target
    PrevBundleOutput,
    /// The output of a transpilation target
    TsTranspilationOutput,
    /// `entry` relative to the output root
    OutputPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleTool {
    #[default]
    Rollup,
    Webpack,
}

/// One element of an `externals` list: a bare module id or a `{module: global}` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalEntry {
    Module(String),
    Globals(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleTarget {
    #[serde(default = "default_library_target")]
    pub library_target: ModuleFormat,

    #[serde(default)]
    pub entry_root: EntryRoot,

    #[serde(default)]
    pub entry: Option<PathBuf>,

    #[serde(default)]
    pub ts_transpilation_index: Option<usize>,

    /// Compiler configuration for `.ts` entries under the `root` strategy.
    #[serde(default)]
    pub ts_config: Option<PathBuf>,

    /// Destination tier.
    #[serde(default)]
    pub script_target: Option<ScriptTarget>,

    #[serde(default)]
    pub output_file_path: Option<String>,

    #[serde(default)]
    pub externals: Option<Vec<ExternalEntry>>,

    #[serde(default, rename = "includeDefaultAngularAndRxJsGlobals")]
    pub include_default_angular_and_rxjs_globals: Option<bool>,

    #[serde(default)]
    pub minify: Option<bool>,

    #[serde(default)]
    pub source_map: Option<bool>,

    #[serde(default)]
    pub bundle_tool: Option<BundleTool>,

    /// Custom configuration merged into the generated plugin-bundler config.
    #[serde(default)]
    pub webpack_config: Option<PathBuf>,

    /// Global name for UMD/IIFE output.
    #[serde(default)]
    pub library_name: Option<String>,
}

impl Default for BundleTarget {
    fn default() -> Self {
        Self {
            library_target: default_library_target(),
            entry_root: EntryRoot::Root,
            entry: None,
            ts_transpilation_index: None,
            ts_config: None,
            script_target: None,
            output_file_path: None,
            externals: None,
            include_default_angular_and_rxjs_globals: None,
            minify: None,
            source_map: None,
            bundle_tool: None,
            webpack_config: None,
            library_name: None,
        }
    }
}

impl Default for LibraryProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            output_path: default_output_path(),
            package_json: default_package_json(),
            root_package_json: None,
            package_json_out_dir: None,
            version: None,
            clean: false,
            copy: Vec::new(),
            banner: None,
            source_map: None,
            styles: Vec::new(),
            style_preprocessor_options: StylePreprocessorOptions::default(),
            externals: None,
            include_default_angular_and_rxjs_globals: None,
            ts_transpilations: Vec::new(),
            bundles: Vec::new(),
        }
    }
}

impl LibraryProjectConfig {
    /// Read a project file and resolve its paths against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| LibpackError::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let base = std::path::absolute(&base).map_err(LibpackError::io(&base))?;

        config.resolve_paths(&base);
        debug!("Loaded project {} (root {})", path.display(), config.root.display());
        Ok(config)
    }

    /// Make every path absolute. `root` is resolved against `base`, everything
    /// else against `root`; the output path keeps its tokens for later.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.root = crate::paths::normalize(&base.join(&self.root));
        let root = self.root.clone();
        let join = |p: &Path| crate::paths::normalize(&root.join(p));

        self.output_path = join(&self.output_path);
        self.package_json = join(&self.package_json);
        self.root_package_json = self.root_package_json.as_deref().map(join);
        self.package_json_out_dir = self.package_json_out_dir.as_deref().map(join);
        self.copy = self.copy.iter().map(|p| join(p)).collect();
        for style in &mut self.styles {
            style.input = join(&style.input);
        }
        self.style_preprocessor_options.include_paths = self
            .style_preprocessor_options
            .include_paths
            .iter()
            .map(|p| join(p))
            .collect();

        for target in &mut self.ts_transpilations {
            target.ts_config = target.ts_config.as_deref().map(join);
            target.i18n_file = target.i18n_file.as_deref().map(join);
            // out_dir is relative to the output path, resolved once tokens are known
        }
        for bundle in &mut self.bundles {
            bundle.ts_config = bundle.ts_config.as_deref().map(join);
            bundle.webpack_config = bundle.webpack_config.as_deref().map(join);
        }
    }
}

/// Collect an externals list into module ids and explicit global names.
pub fn split_externals(entries: &[ExternalEntry]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut modules = Vec::new();
    let mut globals = BTreeMap::new();
    for entry in entries {
        match entry {
            ExternalEntry::Module(id) => modules.push(id.clone()),
            ExternalEntry::Globals(map) => {
                for (id, global) in map {
                    modules.push(id.clone());
                    globals.insert(id.clone(), global.clone());
                }
            }
        }
    }
    (modules, globals)
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("dist/[package-name]")
}

fn default_package_json() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_library_target() -> ModuleFormat {
    ModuleFormat::Esm
}

fn default_true() -> bool {
    true
}
