//! Package manifest synthesis.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::errors::{LibpackError, Result};
use crate::script_target::{ModuleFormat, ScriptTarget};

/// Fields copied from the root manifest when the project leaves them empty.
pub const BACKFILL_FIELDS: [&str; 6] = ["description", "keywords", "author", "license", "repository", "homepage"];

/// Values treated as "not filled in".
pub const PLACEHOLDERS: [&str; 3] = ["[PLACEHOLDER]", "PLACEHOLDER", "0.0.0-PLACEHOLDER"];

/// Manifest entry-point fields in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageEntryPoints {
    entries: Vec<(String, String)>,
}

impl PackageEntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, path: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((key.to_string(), path)),
        }
    }

    pub fn set_if_unset(&mut self, key: &str, path: String) {
        if self.get(key).is_none() {
            self.entries.push((key.to_string(), path));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a bundle written to `file`; paths are relative to `package_dir`.
    pub fn register_bundle(&mut self, format: ModuleFormat, tier: ScriptTarget, file: &Path, package_dir: &Path) {
        let path = crate::paths::manifest_relative(file, package_dir);
        match format {
            ModuleFormat::Umd => self.set("main", path),
            ModuleFormat::Cjs | ModuleFormat::Amd | ModuleFormat::Iife => self.set_if_unset("main", path),
            ModuleFormat::Esm => match tier {
                ScriptTarget::Es5 => {
                    self.set("fesm5", path.clone());
                    self.set_if_unset("module", path);
                }
                ScriptTarget::Es2015 => {
                    self.set("fesm2015", path.clone());
                    self.set_if_unset("es2015", path);
                }
                other => self.set(&format!("fesm{}", other.suffix()), path),
            },
        }
    }

    /// Register a transpilation entry module.
    pub fn register_transpilation(&mut self, tier: ScriptTarget, file: &Path, package_dir: &Path) {
        let path = crate::paths::manifest_relative(file, package_dir);
        self.set(&format!("esm{}", tier.suffix()), path);
    }

    pub fn register_typings(&mut self, file: &Path, package_dir: &Path) {
        self.set("typings", crate::paths::manifest_relative(file, package_dir));
    }
}

pub fn read_manifest(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
    serde_json::from_str(&content).map_err(|e| LibpackError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
        source: Some(Box::new(e)),
    })
}

/// Explicit root manifest, else the nearest `package.json` above `root`.
pub fn find_root_manifest(root: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let mut dir = root.parent();
    while let Some(current) = dir {
        let candidate = current.join("package.json");
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// Configured version, else the root manifest's, else the project manifest's.
pub fn resolve_version(configured: Option<&str>, root: Option<&Value>, project: &Value) -> Result<String> {
    let from_manifest = |m: &Value| {
        m.get("version")
            .and_then(Value::as_str)
            .filter(|v| !is_placeholder(v))
            .map(str::to_string)
    };

    let version = configured
        .map(str::to_string)
        .or_else(|| root.and_then(from_manifest))
        .or_else(|| from_manifest(project))
        .ok_or_else(|| LibpackError::invalid_config("no version configured or found in a package manifest"))?;

    semver::Version::parse(&version)
        .map_err(|e| LibpackError::invalid_config(format!("invalid version '{}': {}", version, e)))?;
    Ok(version)
}

/// Names of `dependencies` and `peerDependencies`.
pub fn installed_packages(manifest: &Value) -> Vec<String> {
    let mut names = Vec::new();
    for section in ["dependencies", "peerDependencies"] {
        if let Some(deps) = manifest.get(section).and_then(Value::as_object) {
            for name in deps.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
    }
    names
}

fn is_placeholder(text: &str) -> bool {
    PLACEHOLDERS.contains(&text.trim())
}

fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty() || is_placeholder(s),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Build the published manifest.
pub fn synthesize(
    project: &Value,
    root: Option<&Value>,
    version: &str,
    entry_points: &PackageEntryPoints,
) -> Result<Value> {
    let Value::Object(project) = project else {
        return Err(LibpackError::invalid_config("package manifest must be a JSON object"));
    };
    let mut manifest: Map<String, Value> = project.clone();

    manifest.remove("devDependencies");
    manifest.insert("version".to_string(), Value::String(version.to_string()));

    if let Some(root) = root {
        for field in BACKFILL_FIELDS {
            if is_unset(manifest.get(field)) && !is_unset(root.get(field)) {
                debug!("Backfilling '{}' from the root manifest", field);
                manifest.insert(field.to_string(), root[field].clone());
            }
        }
    }

    for (key, path) in entry_points.iter() {
        manifest.insert(key.to_string(), Value::String(path.to_string()));
    }

    if !manifest.contains_key("sideEffects") {
        manifest.insert("sideEffects".to_string(), Value::Bool(false));
    }

    Ok(Value::Object(manifest))
}

/// Write `package.json` into `out_dir`.
pub fn write_manifest(manifest: &Value, out_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir).map_err(LibpackError::io(out_dir))?;
    let path = out_dir.join("package.json");
    let mut content = serde_json::to_string_pretty(manifest)?;
    content.push('\n');
    std::fs::write(&path, content).map_err(LibpackError::io(&path))?;
    info!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_entry_point_keys() {
        let dir = Path::new("/p/dist");
        let mut entries = PackageEntryPoints::new();
        entries.register_bundle(ModuleFormat::Cjs, ScriptTarget::Es5, Path::new("/p/dist/bundles/a.cjs.js"), dir);
        entries.register_bundle(ModuleFormat::Umd, ScriptTarget::Es5, Path::new("/p/dist/bundles/a.umd.js"), dir);
        entries.register_bundle(ModuleFormat::Amd, ScriptTarget::Es5, Path::new("/p/dist/bundles/a.amd.js"), dir);
        entries.register_bundle(ModuleFormat::Esm, ScriptTarget::Es5, Path::new("/p/dist/fesm5/a.js"), dir);
        entries.register_bundle(ModuleFormat::Esm, ScriptTarget::Es2015, Path::new("/p/dist/fesm2015/a.js"), dir);
        entries.register_bundle(ModuleFormat::Esm, ScriptTarget::Es2017, Path::new("/p/dist/fesm2017/a.js"), dir);
        entries.register_transpilation(ScriptTarget::Es2015, Path::new("/p/dist/esm2015/public_api.js"), dir);
        entries.register_typings(Path::new("/p/dist/a.d.ts"), dir);

        assert_eq!(entries.get("main"), Some("bundles/a.umd.js"));
        assert_eq!(entries.get("module"), Some("fesm5/a.js"));
        assert_eq!(entries.get("fesm5"), Some("fesm5/a.js"));
        assert_eq!(entries.get("es2015"), Some("fesm2015/a.js"));
        assert_eq!(entries.get("fesm2017"), Some("fesm2017/a.js"));
        assert_eq!(entries.get("esm2015"), Some("esm2015/public_api.js"));
        assert_eq!(entries.get("typings"), Some("a.d.ts"));
    }

    #[test]
    fn test_backfill_placeholders_but_keep_real_values() {
        let project = json!({
            "name": "@acme/widgets",
            "version": "0.0.0-PLACEHOLDER",
            "description": "[PLACEHOLDER]",
            "keywords": [],
            "license": "Apache-2.0",
            "devDependencies": { "typescript": "^5.0.0" },
            "peerDependencies": { "@angular/core": "^17.0.0" }
        });
        let root = json!({
            "version": "4.2.0",
            "description": "Acme widgets",
            "keywords": ["acme"],
            "license": "MIT",
            "author": "Acme"
        });

        let version = resolve_version(None, Some(&root), &project).unwrap();
        assert_eq!(version, "4.2.0");

        let mut entries = PackageEntryPoints::new();
        entries.set("main", "bundles/widgets.umd.js".to_string());
        let manifest = synthesize(&project, Some(&root), &version, &entries).unwrap();

        assert_eq!(manifest["version"], "4.2.0");
        assert_eq!(manifest["description"], "Acme widgets");
        assert_eq!(manifest["keywords"], json!(["acme"]));
        assert_eq!(manifest["license"], "Apache-2.0");
        assert_eq!(manifest["author"], "Acme");
        assert_eq!(manifest["main"], "bundles/widgets.umd.js");
        assert_eq!(manifest["sideEffects"], false);
        assert!(manifest.get("devDependencies").is_none());

        let keys: Vec<&String> = manifest.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "name");
        assert_eq!(keys[1], "version");
    }

    #[test]
    fn test_existing_side_effects_kept() {
        let project = json!({ "name": "a", "sideEffects": ["*.css"] });
        let manifest = synthesize(&project, None, "1.0.0", &PackageEntryPoints::new()).unwrap();
        assert_eq!(manifest["sideEffects"], json!(["*.css"]));
    }

    #[test]
    fn test_version_resolution() {
        let project = json!({ "version": "1.0.0" });
        assert_eq!(resolve_version(Some("2.0.0-beta.1"), None, &project).unwrap(), "2.0.0-beta.1");
        assert_eq!(resolve_version(None, None, &project).unwrap(), "1.0.0");
        assert!(matches!(
            resolve_version(Some("v1"), None, &project),
            Err(LibpackError::InvalidConfig { .. })
        ));
        assert!(resolve_version(None, None, &json!({})).is_err());
    }

    #[test]
    fn test_installed_packages() {
        let manifest = json!({
            "dependencies": { "tslib": "^2" },
            "peerDependencies": { "@angular/core": "^17", "tslib": "^2" }
        });
        assert_eq!(installed_packages(&manifest), vec!["tslib", "@angular/core"]);
    }

    #[test]
    fn test_find_root_manifest_and_write() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("projects/widgets");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("package.json"), "{}").unwrap();
        std::fs::write(temp_dir.path().join("package.json"), "{}").unwrap();

        assert_eq!(find_root_manifest(&root, None), Some(temp_dir.path().join("package.json")));

        let out = temp_dir.path().join("dist");
        let path = write_manifest(&json!({ "name": "a" }), &out).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{\n  \"name\": \"a\"\n}\n");
    }
}
