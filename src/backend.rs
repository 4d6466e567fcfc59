//! Bundling backends and externals resolution.
//!
//! Two backends are supported behind one `build` capability
//! ([`crate::toolchain::Toolchain::bundle`]): a dependency-graph bundler driven
//! through command line flags, and a loader/plugin based bundler driven through
//! a generated JSON configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use walkdir::WalkDir;

use crate::errors::{LibpackError, Result};
use crate::script_target::ModuleFormat;

static BARE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\bfrom\s*|\bimport\s*\(?\s*|\brequire\s*\(\s*)['"]([^'"./][^'"]*)['"]"#).expect("valid regex")
});

const SCANNED_EXTENSIONS: [&str; 3] = ["js", "mjs", "ts"];

/// Well-known framework packages and the globals they expose in UMD builds.
pub const DEFAULT_FRAMEWORK_GLOBALS: &[(&str, &str)] = &[
    ("@angular/animations", "ng.animations"),
    ("@angular/animations/browser", "ng.animations.browser"),
    ("@angular/cdk", "ng.cdk"),
    ("@angular/common", "ng.common"),
    ("@angular/common/http", "ng.common.http"),
    ("@angular/compiler", "ng.compiler"),
    ("@angular/core", "ng.core"),
    ("@angular/elements", "ng.elements"),
    ("@angular/forms", "ng.forms"),
    ("@angular/material", "ng.material"),
    ("@angular/platform-browser", "ng.platformBrowser"),
    ("@angular/platform-browser/animations", "ng.platformBrowser.animations"),
    ("@angular/platform-browser-dynamic", "ng.platformBrowserDynamic"),
    ("@angular/platform-server", "ng.platformServer"),
    ("@angular/router", "ng.router"),
    ("@angular/service-worker", "ng.serviceWorker"),
    ("@angular/upgrade", "ng.upgrade"),
    ("rxjs", "rxjs"),
    ("rxjs/ajax", "rxjs.ajax"),
    ("rxjs/operators", "rxjs.operators"),
    ("rxjs/testing", "rxjs.testing"),
    ("rxjs/webSocket", "rxjs.webSocket"),
    ("tslib", "tslib"),
];

/// Extensions the backends try when resolving bare imports.
pub const RESOLVE_EXTENSIONS: [&str; 4] = [".mjs", ".js", ".json", ".ts"];

/// Externals after policy resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedExternals {
    /// Module ids left out of the bundle.
    pub modules: Vec<String>,
    /// Global variable names for modules, used by UMD/IIFE/AMD output.
    pub globals: BTreeMap<String, String>,
    /// Whether deep imports (`pkg/sub/path`) of the modules are external too.
    pub match_subpaths: bool,
}

impl ResolvedExternals {
    pub fn is_external(&self, id: &str) -> bool {
        self.modules.iter().any(|m| {
            id == m || (self.match_subpaths && id.starts_with(m.as_str()) && id[m.len()..].starts_with('/'))
        })
    }

    /// List deep imports of external packages as ids of their own, so backends
    /// that only match exact ids leave them out too. Returns how many were added.
    pub fn add_deep_imports<'a>(&mut self, specifiers: impl IntoIterator<Item = &'a str>) -> usize {
        if !self.match_subpaths {
            return 0;
        }
        let before = self.modules.len();
        for id in specifiers {
            if self.is_external(id) {
                self.push_module(id);
            }
        }
        self.modules.len() - before
    }

    fn push_module(&mut self, id: &str) {
        if !self.modules.iter().any(|m| m == id) {
            self.modules.push(id.to_string());
        }
    }
}

/// Inputs to externals resolution for one bundle target.
#[derive(Debug, Clone, Copy)]
pub struct ExternalsPolicy<'a> {
    /// The target's (or project's) explicit list, `Some` even when empty.
    pub explicit: Option<&'a [crate::project::ExternalEntry]>,
    /// `includeDefaultAngularAndRxJsGlobals`; unset means enabled.
    pub include_default_globals: Option<bool>,
    /// Installed packages (`dependencies` + `peerDependencies`).
    pub installed: &'a [String],
}

/// Resolve the externals for a bundle built by `backend` in `format`.
pub fn resolve_externals(
    policy: ExternalsPolicy<'_>,
    backend: &BundlerBackend,
    format: ModuleFormat,
) -> ResolvedExternals {
    let mut resolved = ResolvedExternals::default();

    match policy.explicit {
        Some(entries) => {
            let (modules, globals) = crate::project::split_externals(entries);
            for module in &modules {
                resolved.push_module(module);
            }
            resolved.globals.extend(globals);
        }
        None => {
            for package in policy.installed {
                resolved.push_module(package);
            }
            resolved.match_subpaths = true;
        }
    }

    // An explicit empty list is not an opt-out; only `false` disables the table.
    if policy.include_default_globals != Some(false) && backend.needs_flat_globals(format) {
        for (module, global) in DEFAULT_FRAMEWORK_GLOBALS {
            resolved.push_module(module);
            resolved
                .globals
                .entry((*module).to_string())
                .or_insert_with(|| (*global).to_string());
        }
    }

    resolved
}

/// Bare module specifiers imported by `code`.
pub fn bare_imports(code: &str) -> impl Iterator<Item = &str> {
    BARE_IMPORT
        .captures_iter(code)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Bare specifiers imported by the scripts next to (and below) `entry`.
pub fn scan_bare_imports(entry: &Path) -> Vec<String> {
    let Some(dir) = entry.parent() else {
        return Vec::new();
    };
    let mut found: Vec<String> = Vec::new();
    let files = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| SCANNED_EXTENSIONS.contains(&x))
        });
    for file in files {
        let Ok(code) = std::fs::read_to_string(file.path()) else {
            continue;
        };
        for id in bare_imports(&code) {
            if !found.iter().any(|f| f == id) {
                found.push(id.to_string());
            }
        }
    }
    found
}

/// Options for the dependency-graph bundler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphBundlerOptions {
    pub banner: Option<String>,
}

/// Options for the loader/plugin bundler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginBundlerOptions {
    /// JSON document deep-merged over the generated configuration.
    pub merge_config: Option<PathBuf>,
}

/// The bundling backend selected for a target.
#[derive(Debug, Clone, PartialEq)]
pub enum BundlerBackend {
    Graph(GraphBundlerOptions),
    Plugin(PluginBundlerOptions),
}

/// Everything a backend needs to produce one artifact.
#[derive(Debug, Clone)]
pub struct BundleJob {
    pub index: usize,
    pub backend: BundlerBackend,
    pub entry: PathBuf,
    pub output: PathBuf,
    pub format: ModuleFormat,
    pub library_name: String,
    pub externals: ResolvedExternals,
    pub source_map: bool,
    /// Package.json fields preferred when resolving bare imports.
    pub main_fields: Vec<String>,
}

impl BundlerBackend {
    pub fn select(tool: Option<crate::project::BundleTool>, merge_config: Option<&Path>, banner: Option<String>) -> Self {
        match (tool, merge_config) {
            (Some(crate::project::BundleTool::Webpack), _) | (_, Some(_)) => Self::Plugin(PluginBundlerOptions {
                merge_config: merge_config.map(Path::to_path_buf),
            }),
            _ => Self::Graph(GraphBundlerOptions { banner }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Graph(_) => "rollup",
            Self::Plugin(_) => "webpack",
        }
    }

    /// The graph bundler addresses externals through a flat global namespace
    /// for browser-global formats; the plugin bundler maps them per module.
    pub fn needs_flat_globals(&self, format: ModuleFormat) -> bool {
        match self {
            Self::Graph(_) => format.needs_globals(),
            Self::Plugin(_) => false,
        }
    }
}

/// Command line for the graph bundler.
pub fn graph_bundler_args(job: &BundleJob, options: &GraphBundlerOptions) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        job.entry.to_string_lossy().into_owned(),
        "-o".to_string(),
        job.output.to_string_lossy().into_owned(),
        "-f".to_string(),
        job.format.graph_bundler_name().to_string(),
    ];

    if job.format.needs_globals() {
        args.push("-n".to_string());
        args.push(job.library_name.clone());
    }
    if !job.externals.modules.is_empty() {
        args.push("-e".to_string());
        args.push(job.externals.modules.join(","));
    }
    if job.format.needs_globals() && !job.externals.globals.is_empty() {
        let globals = job
            .externals
            .globals
            .iter()
            .map(|(module, global)| format!("{}:{}", module, global))
            .collect::<Vec<_>>()
            .join(",");
        args.push("-g".to_string());
        args.push(globals);
    }
    if job.source_map {
        args.push("--sourcemap".to_string());
    }
    if let Some(banner) = &options.banner {
        args.push("--banner".to_string());
        args.push(banner.clone());
    }
    args.push("--silent".to_string());
    args
}

/// Configuration object for the plugin bundler, before the custom merge file.
pub fn plugin_bundler_config(job: &BundleJob) -> Value {
    let output_dir = job.output.parent().unwrap_or_else(|| Path::new("."));
    let file_name = job
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let externals: Map<String, Value> = job
        .externals
        .modules
        .iter()
        .map(|module| {
            let root: Vec<&str> = job
                .externals
                .globals
                .get(module)
                .map(|g| g.split('.').collect())
                .unwrap_or_else(|| vec![module.as_str()]);
            (
                module.clone(),
                json!({
                    "commonjs": module,
                    "commonjs2": module,
                    "amd": module,
                    "root": root,
                }),
            )
        })
        .collect();

    let mut library = json!({ "type": job.format.plugin_bundler_name() });
    if job.format.needs_globals() {
        library["name"] = Value::String(job.library_name.clone());
    }

    let devtool = if job.source_map {
        Value::from("source-map")
    } else {
        Value::Bool(false)
    };

    let mut config = json!({
        "mode": "none",
        "entry": job.entry.to_string_lossy(),
        "output": {
            "path": output_dir.to_string_lossy(),
            "filename": file_name,
            "library": library,
        },
        "externals": externals,
        "resolve": {
            "extensions": RESOLVE_EXTENSIONS,
            "mainFields": job.main_fields,
        },
        "devtool": devtool,
        "optimization": { "minimize": false },
    });
    if job.format.is_esm() {
        config["experiments"] = json!({ "outputModule": true });
    }
    config
}

/// Deep-merge `overlay` into `base`; objects merge recursively, everything else is replaced.
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Generated plugin-bundler configuration with the custom merge file applied.
pub fn plugin_bundler_config_merged(job: &BundleJob, options: &PluginBundlerOptions) -> Result<Value> {
    let mut config = plugin_bundler_config(job);
    if let Some(path) = &options.merge_config {
        let content = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
        let overlay: Value = serde_json::from_str(&content).map_err(|e| LibpackError::Parse {
            file: path.clone(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        merge_json(&mut config, &overlay);
    }
    Ok(config)
}

/// Turn the plugin bundler's stats document into an error, if it reports any.
pub fn plugin_stats_error(stats: &Value) -> Option<LibpackError> {
    let errors = stats.get("errors")?.as_array()?;
    let first = errors.first()?;

    let (message, details, stack) = match first {
        Value::String(text) => (text.clone(), None, None),
        other => (
            other
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
            other.get("details").and_then(Value::as_str).map(str::to_string),
            other.get("stack").and_then(Value::as_str).map(str::to_string),
        ),
    };

    let details = match (details, errors.len()) {
        (details, 1) => details,
        (details, n) => Some(format!(
            "{}{} more error(s) reported",
            details.map(|d| format!("{}\n", d)).unwrap_or_default(),
            n - 1
        )),
    };

    Some(LibpackError::Bundle {
        message,
        details,
        stack,
    })
}

/// Split graph-bundler stderr into message, details and stack.
pub fn graph_bundler_error(stderr: &[String]) -> LibpackError {
    let mut lines = stderr.iter().map(|l| l.trim_end()).filter(|l| !l.trim().is_empty());
    let message = lines
        .next()
        .map(|l| l.trim_start_matches("[!]").trim().to_string())
        .unwrap_or_else(|| "bundler exited with an error".to_string());

    let (stack, details): (Vec<&str>, Vec<&str>) = lines.partition(|l| l.trim_start().starts_with("at "));

    LibpackError::Bundle {
        message,
        details: (!details.is_empty()).then(|| details.join("\n")),
        stack: (!stack.is_empty()).then(|| stack.join("\n")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ExternalEntry;

    fn job(format: ModuleFormat, backend: BundlerBackend, externals: ResolvedExternals) -> BundleJob {
        BundleJob {
            index: 0,
            backend,
            entry: PathBuf::from("/p/dist/esm2015/index.js"),
            output: PathBuf::from("/p/dist/bundles/lib.umd.js"),
            format,
            library_name: "lib".to_string(),
            externals,
            source_map: true,
            main_fields: vec!["module".to_string(), "main".to_string()],
        }
    }

    #[test]
    fn test_explicit_empty_list_keeps_default_table() {
        let installed = vec!["lodash".to_string()];
        let empty: Vec<ExternalEntry> = Vec::new();
        let backend = BundlerBackend::Graph(GraphBundlerOptions::default());
        let resolved = resolve_externals(
            ExternalsPolicy {
                explicit: Some(&empty),
                include_default_globals: None,
                installed: &installed,
            },
            &backend,
            ModuleFormat::Umd,
        );

        assert!(!resolved.modules.contains(&"lodash".to_string()));
        assert_eq!(resolved.globals.get("@angular/core").map(String::as_str), Some("ng.core"));
        assert!(resolved.is_external("rxjs/operators"));
    }

    #[test]
    fn test_default_table_disabled_explicitly() {
        let empty: Vec<ExternalEntry> = Vec::new();
        let backend = BundlerBackend::Graph(GraphBundlerOptions::default());
        let resolved = resolve_externals(
            ExternalsPolicy {
                explicit: Some(&empty),
                include_default_globals: Some(false),
                installed: &[],
            },
            &backend,
            ModuleFormat::Umd,
        );
        assert!(resolved.modules.is_empty());
        assert!(resolved.globals.is_empty());
    }

    #[test]
    fn test_installed_packages_are_external_by_default() {
        let installed = vec!["lodash".to_string(), "@acme/core".to_string()];
        let backend = BundlerBackend::Plugin(PluginBundlerOptions::default());
        let resolved = resolve_externals(
            ExternalsPolicy {
                explicit: None,
                include_default_globals: None,
                installed: &installed,
            },
            &backend,
            ModuleFormat::Umd,
        );

        assert!(resolved.is_external("lodash"));
        assert!(resolved.is_external("@acme/core/testing"));
        assert!(!resolved.is_external("lodash-es"));
        // plugin bundler maps externals per module; no flat global table
        assert!(!resolved.globals.contains_key("@angular/core"));
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(BundlerBackend::select(None, None, None).name(), "rollup");
        assert_eq!(
            BundlerBackend::select(Some(crate::project::BundleTool::Webpack), None, None).name(),
            "webpack"
        );
        assert_eq!(
            BundlerBackend::select(None, Some(Path::new("/p/webpack.extra.json")), None).name(),
            "webpack"
        );
    }

    #[test]
    fn test_deep_imports_are_external_in_both_backends() {
        let installed = vec!["lodash".to_string(), "@angular/common".to_string()];
        let code = r#"
            import { map } from 'lodash/fp';
            import { HttpClient } from "@angular/common/http";
            import './side-effect';
            export * from '../shared/util';
            const chunk = import('lodash/chunk');
            const other = require('moment/locale/de');
        "#;
        let found: Vec<&str> = bare_imports(code).collect();
        assert_eq!(found, vec!["lodash/fp", "@angular/common/http", "lodash/chunk", "moment/locale/de"]);

        for backend in [
            BundlerBackend::Graph(GraphBundlerOptions::default()),
            BundlerBackend::Plugin(PluginBundlerOptions::default()),
        ] {
            let mut externals = resolve_externals(
                ExternalsPolicy {
                    explicit: None,
                    include_default_globals: Some(false),
                    installed: &installed,
                },
                &backend,
                ModuleFormat::Esm,
            );
            assert_eq!(externals.add_deep_imports(bare_imports(code)), 3);
            assert!(!externals.modules.contains(&"moment/locale/de".to_string()));

            let job = job(ModuleFormat::Esm, backend.clone(), externals);
            match &backend {
                BundlerBackend::Graph(options) => {
                    let args = graph_bundler_args(&job, options);
                    let at = args.iter().position(|a| a == "-e").unwrap();
                    let listed: Vec<&str> = args[at + 1].split(',').collect();
                    assert!(listed.contains(&"lodash/fp"));
                    assert!(listed.contains(&"@angular/common/http"));
                    assert!(listed.contains(&"lodash/chunk"));
                }
                BundlerBackend::Plugin(_) => {
                    let config = plugin_bundler_config(&job);
                    assert_eq!(config["externals"]["lodash/fp"]["commonjs"], "lodash/fp");
                    assert_eq!(config["externals"]["@angular/common/http"]["amd"], "@angular/common/http");
                }
            }
        }
    }

    #[test]
    fn test_deep_imports_ignored_for_exact_lists() {
        let mut externals = ResolvedExternals {
            modules: vec!["lodash".to_string()],
            ..Default::default()
        };
        assert_eq!(externals.add_deep_imports(["lodash/fp"]), 0);
        assert_eq!(externals.modules, vec!["lodash".to_string()]);
    }

    #[test]
    fn test_scan_bare_imports_skips_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        std::fs::write(dir.path().join("index.js"), "export * from './lib/a';
").unwrap();
        std::fs::write(dir.path().join("lib/a.js"), "import fp from 'lodash/fp';
").unwrap();
        std::fs::write(dir.path().join("node_modules/x/i.js"), "import 'hidden/deep';
").unwrap();

        let found = scan_bare_imports(&dir.path().join("index.js"));
        assert_eq!(found, vec!["lodash/fp".to_string()]);
    }

    #[test]
    fn test_graph_bundler_args() {
        let mut externals = ResolvedExternals::default();
        externals.modules.push("@angular/core".to_string());
        externals.globals.insert("@angular/core".to_string(), "ng.core".to_string());
        let options = GraphBundlerOptions {
            banner: Some("/*! lib */".to_string()),
        };
        let job = job(ModuleFormat::Umd, BundlerBackend::Graph(options.clone()), externals);

        let args = graph_bundler_args(&job, &options);
        let joined = args.join(" ");
        assert!(joined.contains("-f umd"));
        assert!(joined.contains("-n lib"));
        assert!(joined.contains("-e @angular/core"));
        assert!(joined.contains("-g @angular/core:ng.core"));
        assert!(joined.contains("--sourcemap"));
        assert!(joined.contains("--banner /*! lib */"));
    }

    #[test]
    fn test_plugin_config_and_merge() {
        let mut externals = ResolvedExternals::default();
        externals.modules.push("rxjs".to_string());
        let job = job(
            ModuleFormat::Umd,
            BundlerBackend::Plugin(PluginBundlerOptions::default()),
            externals,
        );

        let mut config = plugin_bundler_config(&job);
        assert_eq!(config["output"]["filename"], "lib.umd.js");
        assert_eq!(config["output"]["library"]["type"], "umd");
        assert_eq!(config["externals"]["rxjs"]["commonjs"], "rxjs");
        assert_eq!(config["devtool"], "source-map");

        merge_json(&mut config, &json!({ "output": { "filename": "custom.js" }, "stats": "errors-only" }));
        assert_eq!(config["output"]["filename"], "custom.js");
        assert_eq!(config["output"]["library"]["type"], "umd");
        assert_eq!(config["stats"], "errors-only");
    }

    #[test]
    fn test_plugin_stats_error() {
        let stats = json!({ "errors": [
            { "message": "Module not found", "details": "resolving './x'", "stack": "at resolve" },
            "second"
        ]});
        let err = plugin_stats_error(&stats).unwrap();
        let report = err.report();
        assert!(report.contains("Module not found"));
        assert!(report.contains("1 more error(s) reported"));
        assert!(report.contains("at resolve"));

        assert!(plugin_stats_error(&json!({ "errors": [] })).is_none());
    }

    #[test]
    fn test_graph_bundler_error_split() {
        let stderr = vec![
            "[!] Error: Could not resolve './missing' from src/index.js".to_string(),
            "src/index.js".to_string(),
            "    at error (rollup.js:1:1)".to_string(),
        ];
        match graph_bundler_error(&stderr) {
            LibpackError::Bundle { message, details, stack } => {
                assert_eq!(message, "Error: Could not resolve './missing' from src/index.js");
                assert_eq!(details.as_deref(), Some("src/index.js"));
                assert!(stack.unwrap().contains("at error"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
