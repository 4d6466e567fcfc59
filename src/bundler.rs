//! Bundle stage: resolves every bundle target up front, then builds them in
//! declared order.
//!
//! Resolution runs no external tool, so a target referencing something that
//! does not exist fails the build before the first backend runs.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::backend::{BundleJob, BundlerBackend, ExternalsPolicy, ResolvedExternals, resolve_externals, scan_bare_imports};
use crate::compiler::TranspilationPlan;
use crate::errors::{LibpackError, Result};
use crate::manifest::PackageEntryPoints;
use crate::minify::{minify_output, should_minify};
use crate::pipeline::BuildContext;
use crate::project::{BundleTarget, EntryRoot, LibraryProjectConfig};
use crate::script_target::{ModuleFormat, ScriptTarget};
use crate::sourcemap::{compose_file_map, map_path_for};
use crate::toolchain::{Toolchain, TransformJob};
use crate::tsconfig::CompilerConfig;

/// Tier assumed for hand-written entries when no `scriptTarget` is configured.
pub const DEFAULT_ENTRY_TIER: ScriptTarget = ScriptTarget::Es2015;

/// A bundle target with every path, tier and policy decided.
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    pub index: usize,
    pub format: ModuleFormat,
    pub entry: PathBuf,
    /// The entry is hand-written source, not the product of an earlier stage.
    pub entry_is_source: bool,
    pub output: PathBuf,
    /// Where the backend writes when a tier transform follows.
    pub staging: Option<PathBuf>,
    pub source_tier: ScriptTarget,
    pub destination_tier: ScriptTarget,
    pub externals: ResolvedExternals,
    pub backend: BundlerBackend,
    pub minify: bool,
    pub source_map: bool,
    pub library_name: String,
}

impl ResolvedBundle {
    /// File the backend writes.
    pub fn backend_output(&self) -> &Path {
        self.staging.as_deref().unwrap_or(&self.output)
    }

    pub fn needs_transform(&self) -> bool {
        self.staging.is_some()
    }
}

/// What happened to one bundle target.
#[derive(Debug, Clone, PartialEq)]
pub enum BundleStatus {
    Built { output: PathBuf, minified: Option<PathBuf> },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleOutcome {
    pub index: usize,
    pub status: BundleStatus,
}

/// Resolve all bundle targets against the transpilation plans.
pub fn resolve_bundles(
    project: &LibraryProjectConfig,
    ctx: &BuildContext,
    transpilations: &[TranspilationPlan],
) -> Result<Vec<ResolvedBundle>> {
    let multiple_artifacts = project.bundles.len() > 1 || !project.ts_transpilations.is_empty();
    let banner = project
        .banner
        .as_deref()
        .map(|b| crate::tokens::resolve_banner(b, &ctx.identity, &ctx.version));

    let mut resolved: Vec<ResolvedBundle> = Vec::with_capacity(project.bundles.len());
    for (index, target) in project.bundles.iter().enumerate() {
        let bundle = resolve_bundle(
            index,
            target,
            project,
            ctx,
            transpilations,
            resolved.last(),
            multiple_artifacts,
            banner.clone(),
        )?;
        resolved.push(bundle);
    }
    Ok(resolved)
}

#[allow(clippy::too_many_arguments)]
fn resolve_bundle(
    index: usize,
    target: &BundleTarget,
    project: &LibraryProjectConfig,
    ctx: &BuildContext,
    transpilations: &[TranspilationPlan],
    previous: Option<&ResolvedBundle>,
    multiple_artifacts: bool,
    banner: Option<String>,
) -> Result<ResolvedBundle> {
    let location = format!("bundles[{}]", index);
    let require_entry = |strategy: &str| {
        target.entry.as_deref().ok_or_else(|| {
            LibpackError::invalid_config_at(&location, format!("'entry' is required when entryRoot is '{}'", strategy))
        })
    };

    let (entry, source_tier, entry_is_source) = match target.entry_root {
        EntryRoot::Root => {
            let entry = crate::paths::normalize(&ctx.root.join(require_entry("root")?));
            let is_typescript = entry.extension().map(|e| e == "ts" || e == "tsx").unwrap_or(false);
            let tier = if is_typescript {
                let config_tier = match (&target.ts_config, transpilations.first()) {
                    (Some(path), _) => CompilerConfig::load(path)?.script_target(),
                    (None, Some(first)) => Some(first.target),
                    (None, None) => {
                        return Err(LibpackError::invalid_config_at(
                            &location,
                            "'tsConfig' is required for a TypeScript entry",
                        ));
                    }
                };
                config_tier.unwrap_or(DEFAULT_ENTRY_TIER)
            } else {
                target.script_target.unwrap_or(DEFAULT_ENTRY_TIER)
            };
            (entry, tier, true)
        }
        EntryRoot::PrevBundleOutput => {
            let previous = previous.filter(|_| index > 0).ok_or_else(|| {
                LibpackError::invalid_config_at(
                    &location,
                    "entryRoot 'prevBundleOutput' needs a previous bundle target",
                )
            })?;
            (previous.output.clone(), previous.destination_tier, false)
        }
        EntryRoot::TsTranspilationOutput => {
            let ts_index = target.ts_transpilation_index.unwrap_or(0);
            let plan = transpilations.get(ts_index).ok_or_else(|| {
                LibpackError::invalid_config_at(
                    &location,
                    format!("tsTranspilations[{}] does not exist", ts_index),
                )
            })?;
            let entry = match &target.entry {
                Some(entry) => crate::paths::normalize(&plan.out_dir.join(crate::paths::with_js_extension(entry))),
                None => plan.entry_file(),
            };
            (entry, plan.target, false)
        }
        EntryRoot::OutputPath => {
            let entry = crate::paths::normalize(&ctx.output_root.join(require_entry("outputPath")?));
            (entry, target.script_target.unwrap_or(DEFAULT_ENTRY_TIER), false)
        }
    };

    let destination_tier = target.script_target.unwrap_or(source_tier);
    let output = output_path(target, ctx, &entry, destination_tier, multiple_artifacts);
    let staging = (source_tier != destination_tier).then(|| crate::transform::staging_path(&output));

    let backend = BundlerBackend::select(target.bundle_tool, target.webpack_config.as_deref(), banner);
    if matches!(backend, BundlerBackend::Plugin(_)) && project.banner.is_some() {
        warn!("{}: the banner is only applied by the rollup backend", location);
    }

    let explicit = target.externals.as_deref().or(project.externals.as_deref());
    let include_default_globals = target
        .include_default_angular_and_rxjs_globals
        .or(project.include_default_angular_and_rxjs_globals);
    let externals = resolve_externals(
        ExternalsPolicy {
            explicit,
            include_default_globals,
            installed: &ctx.installed,
        },
        &backend,
        target.library_target,
    );

    Ok(ResolvedBundle {
        index,
        format: target.library_target,
        entry,
        entry_is_source,
        output,
        staging,
        source_tier,
        destination_tier,
        externals,
        backend,
        minify: should_minify(target.minify, target.library_target, destination_tier),
        source_map: target.source_map.unwrap_or(ctx.source_maps),
        library_name: target
            .library_name
            .clone()
            .unwrap_or_else(|| ctx.identity.global_name()),
    })
}

/// Output file for a bundle target, absolute.
pub fn output_path(
    target: &BundleTarget,
    ctx: &BuildContext,
    entry: &Path,
    tier: ScriptTarget,
    multiple_artifacts: bool,
) -> PathBuf {
    let entry_stem = crate::paths::file_stem(entry);
    let name = if ctx.identity.package_name.is_empty() {
        entry_stem.clone()
    } else {
        ctx.identity.package_name.clone()
    };

    let implicit = match target.library_target {
        ModuleFormat::Esm => PathBuf::from(format!("fesm{}", tier.suffix())).join(format!("{}.js", name)),
        format if multiple_artifacts => PathBuf::from("bundles").join(format!("{}.{}.js", name, format)),
        _ => PathBuf::from(format!("{}.js", name)),
    };

    let relative = match &target.output_file_path {
        None => implicit,
        Some(explicit) => {
            let resolved = crate::tokens::resolve_tokens(explicit, &ctx.identity, Some(&entry_stem));
            let is_dir = resolved.ends_with('/')
                || resolved.ends_with('\\')
                || Path::new(&resolved).extension().map(|e| e != "js").unwrap_or(true);
            if is_dir {
                let file_name = implicit.file_name().map(PathBuf::from).unwrap_or_default();
                PathBuf::from(resolved).join(file_name)
            } else {
                PathBuf::from(resolved)
            }
        }
    };

    crate::paths::normalize(&ctx.output_root.join(relative))
}

/// Build every resolved bundle in order. Recoverable failures are logged and
/// the next target runs; anything else aborts.
pub async fn run_bundles<T: Toolchain>(
    toolchain: &T,
    bundles: &[ResolvedBundle],
    ctx: &BuildContext,
    package_dir: &Path,
    entry_points: &mut PackageEntryPoints,
) -> Result<Vec<BundleOutcome>> {
    let mut outcomes = Vec::with_capacity(bundles.len());

    for bundle in bundles {
        info!(
            "Bundling bundles[{}] as {} ({} -> {}) with {}",
            bundle.index,
            bundle.format,
            bundle.source_tier,
            bundle.destination_tier,
            bundle.backend.name()
        );

        let status = match build_bundle(toolchain, bundle, ctx).await {
            Ok(minified) => {
                entry_points.register_bundle(bundle.format, bundle.destination_tier, &bundle.output, package_dir);
                BundleStatus::Built {
                    output: bundle.output.clone(),
                    minified,
                }
            }
            Err(e) if e.is_bundle_recoverable() => {
                error!("bundles[{}] failed: {}", bundle.index, e.report());
                BundleStatus::Failed { message: e.to_string() }
            }
            Err(e) => return Err(e),
        };

        outcomes.push(BundleOutcome {
            index: bundle.index,
            status,
        });
    }

    Ok(outcomes)
}

async fn build_bundle<T: Toolchain>(toolchain: &T, bundle: &ResolvedBundle, ctx: &BuildContext) -> Result<Option<PathBuf>> {
    if let Some(dir) = bundle.output.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(LibpackError::io(dir))?;
    }

    let mut externals = bundle.externals.clone();
    if externals.match_subpaths {
        let imports = scan_bare_imports(&bundle.entry);
        let added = externals.add_deep_imports(imports.iter().map(String::as_str));
        if added > 0 {
            debug!("bundles[{}]: {} deep import(s) marked external", bundle.index, added);
        }
    }

    let target = bundle.backend_output();
    toolchain
        .bundle(&BundleJob {
            index: bundle.index,
            backend: bundle.backend.clone(),
            entry: bundle.entry.clone(),
            output: target.to_path_buf(),
            format: bundle.format,
            library_name: bundle.library_name.clone(),
            externals,
            source_map: bundle.source_map,
            main_fields: bundle
                .destination_tier
                .main_fields()
                .iter()
                .map(|f| f.to_string())
                .collect(),
        })
        .await?;

    if bundle.source_map && !bundle.entry_is_source {
        let map = map_path_for(target);
        if map.is_file() {
            compose_file_map(&map)?;
        }
    }

    if let Some(staging) = &bundle.staging {
        crate::transform::transform_script_target(
            toolchain,
            &TransformJob {
                source: staging.clone(),
                destination: bundle.output.clone(),
                target: bundle.destination_tier,
                module: bundle.format,
                source_map: bundle.source_map,
            },
        )
        .await?;
    }

    if bundle.minify {
        let minified = minify_output(toolchain, ctx.tools.minify.engine, &bundle.output, bundle.source_map).await?;
        return Ok(Some(minified));
    }
    Ok(None)
}

/// One-line summary of a resolved bundle, relative to the output root.
pub fn describe(bundle: &ResolvedBundle, output_root: &Path) -> String {
    let rel = |p: &Path| crate::paths::manifest_relative(p, output_root);
    let mut line = format!(
        "bundles[{}] {} {} -> {} via {}: {} -> {}",
        bundle.index,
        bundle.format,
        bundle.source_tier,
        bundle.destination_tier,
        bundle.backend.name(),
        rel(&bundle.entry),
        rel(&bundle.output)
    );
    if bundle.needs_transform() {
        line.push_str(" [transform]");
    }
    if bundle.minify {
        line.push_str(" [minify]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tokens::ProjectIdentity;
    use crate::toolchain::{CompileJob, MinifyJob, StyleJob};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingToolchain {
        bundles: Mutex<Vec<BundleJob>>,
        fail_index: Option<usize>,
        fail_transform: Option<PathBuf>,
    }

    impl Toolchain for RecordingToolchain {
        async fn compile(&self, _: &CompileJob) -> Result<()> {
            Ok(())
        }
        async fn bundle(&self, job: &BundleJob) -> Result<()> {
            self.bundles.lock().unwrap().push(job.clone());
            if self.fail_index == Some(job.index) {
                return Err(LibpackError::bundle("Could not resolve entry module"));
            }
            std::fs::write(&job.output, "export const a = 1;\n").unwrap();
            Ok(())
        }
        async fn transform(&self, job: &TransformJob) -> Result<()> {
            if self.fail_transform.as_deref() == Some(job.destination.as_path()) {
                return Err(LibpackError::compile("TS1005: ';' expected"));
            }
            std::fs::copy(&job.source, &job.destination).unwrap();
            Ok(())
        }
        async fn minify(&self, _: &MinifyJob) -> Result<()> {
            Ok(())
        }
        async fn preprocess_style(&self, _: &StyleJob) -> Result<String> {
            Ok(String::new())
        }
    }

    fn context(root: &Path) -> BuildContext {
        BuildContext {
            build_id: uuid::Uuid::new_v4(),
            root: root.to_path_buf(),
            output_root: root.join("dist"),
            identity: ProjectIdentity::from_package_name("@acme/widgets"),
            version: "1.0.0".to_string(),
            source_maps: false,
            installed: vec!["tslib".to_string()],
            tools: Config::default(),
        }
    }

    fn project(json: &str) -> LibraryProjectConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_chained_bundle_takes_previous_output_and_tier() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let project = project(
            r#"{ "bundles": [
                { "libraryTarget": "esm", "entry": "src/index.js", "scriptTarget": "es2015",
                  "outputFilePath": "fesm2015/[package-name].js" },
                { "libraryTarget": "umd", "entryRoot": "prevBundleOutput" }
            ] }"#,
        );

        let bundles = resolve_bundles(&project, &ctx, &[]).unwrap();
        assert_eq!(bundles[0].output, ctx.output_root.join("fesm2015/widgets.js"));
        assert_eq!(bundles[1].entry, bundles[0].output);
        assert_eq!(bundles[1].source_tier, bundles[0].destination_tier);
        assert_eq!(bundles[1].output, ctx.output_root.join("bundles/widgets.umd.js"));
        assert!(!bundles[1].needs_transform());
        assert!(!bundles[1].minify);
        assert_eq!(bundles[1].library_name, "acme.widgets");
    }

    #[test]
    fn test_missing_previous_bundle_fails_before_any_backend() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let project = project(
            r#"{ "bundles": [
                { "libraryTarget": "umd", "entryRoot": "prevBundleOutput" },
                { "libraryTarget": "esm", "entry": "src/index.js" }
            ] }"#,
        );
        let toolchain = RecordingToolchain::default();

        let err = resolve_bundles(&project, &ctx, &[]).unwrap_err();
        assert!(matches!(err, LibpackError::InvalidConfig { location: Some(ref l), .. } if l == "bundles[0]"));
        assert!(toolchain.bundles.lock().unwrap().is_empty());
    }

    #[test]
    fn test_entry_strategies_require_fields() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());

        for json in [
            r#"{ "bundles": [ { "entryRoot": "root" } ] }"#,
            r#"{ "bundles": [ { "entryRoot": "outputPath" } ] }"#,
            r#"{ "bundles": [ { "entryRoot": "tsTranspilationOutput", "tsTranspilationIndex": 2 } ] }"#,
            r#"{ "bundles": [ { "entry": "src/index.ts" } ] }"#,
        ] {
            let err = resolve_bundles(&project(json), &ctx, &[]).unwrap_err();
            assert!(matches!(err, LibpackError::InvalidConfig { .. }), "{json}");
        }
    }

    #[test]
    fn test_output_path_rules() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let entry = Path::new("/p/src/public_api.js");

        let single = BundleTarget {
            library_target: ModuleFormat::Cjs,
            ..BundleTarget::default()
        };
        assert_eq!(
            output_path(&single, &ctx, entry, ScriptTarget::Es5, false),
            ctx.output_root.join("widgets.js")
        );
        assert_eq!(
            output_path(&single, &ctx, entry, ScriptTarget::Es5, true),
            ctx.output_root.join("bundles/widgets.cjs.js")
        );

        let esm = BundleTarget::default();
        assert_eq!(
            output_path(&esm, &ctx, entry, ScriptTarget::Es5, true),
            ctx.output_root.join("fesm5/widgets.js")
        );

        let dir = BundleTarget {
            library_target: ModuleFormat::Umd,
            output_file_path: Some("umd/[package-scope]/".to_string()),
            ..BundleTarget::default()
        };
        assert_eq!(
            output_path(&dir, &ctx, entry, ScriptTarget::Es5, true),
            ctx.output_root.join("umd/acme/widgets.umd.js")
        );

        let named = BundleTarget {
            output_file_path: Some("custom/[name].mjs.d".to_string()),
            ..BundleTarget::default()
        };
        assert_eq!(
            output_path(&named, &ctx, entry, ScriptTarget::Es2015, false),
            ctx.output_root.join("custom/public_api.mjs.d/widgets.js")
        );

        let file = BundleTarget {
            output_file_path: Some("[name].js".to_string()),
            ..BundleTarget::default()
        };
        assert_eq!(
            output_path(&file, &ctx, entry, ScriptTarget::Es2015, false),
            ctx.output_root.join("public_api.js")
        );
    }

    #[test]
    fn test_explicit_empty_externals_keep_default_globals() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let project = project(
            r#"{ "bundles": [ { "libraryTarget": "umd", "entry": "src/index.js", "externals": [] } ] }"#,
        );

        let bundles = resolve_bundles(&project, &ctx, &[]).unwrap();
        let externals = &bundles[0].externals;
        assert_eq!(externals.globals.get("rxjs").map(String::as_str), Some("rxjs"));
        assert!(externals.is_external("@angular/core"));
        assert!(!externals.match_subpaths);
    }

    #[tokio::test]
    async fn test_failed_bundle_does_not_stop_the_next() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let project = project(
            r#"{ "bundles": [
                { "libraryTarget": "esm", "entry": "src/index.js" },
                { "libraryTarget": "cjs", "entry": "src/index.js" }
            ] }"#,
        );
        let toolchain = RecordingToolchain {
            fail_index: Some(0),
            ..RecordingToolchain::default()
        };

        let bundles = resolve_bundles(&project, &ctx, &[]).unwrap();
        let mut entry_points = PackageEntryPoints::new();
        let outcomes = run_bundles(&toolchain, &bundles, &ctx, &ctx.output_root, &mut entry_points)
            .await
            .unwrap();

        assert!(matches!(outcomes[0].status, BundleStatus::Failed { .. }));
        assert!(matches!(outcomes[1].status, BundleStatus::Built { .. }));
        assert_eq!(entry_points.get("main"), Some("bundles/widgets.cjs.js"));
        assert_eq!(entry_points.get("fesm2015"), None);
    }

    #[tokio::test]
    async fn test_tier_change_stages_then_transforms() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let project = project(
            r#"{ "bundles": [
                { "libraryTarget": "esm", "entry": "src/index.js", "scriptTarget": "es2015" },
                { "libraryTarget": "umd", "entryRoot": "prevBundleOutput", "scriptTarget": "es5" }
            ] }"#,
        );
        let toolchain = RecordingToolchain::default();

        let bundles = resolve_bundles(&project, &ctx, &[]).unwrap();
        assert!(bundles[1].needs_transform());
        assert!(bundles[1].minify);

        let mut entry_points = PackageEntryPoints::new();
        let outcomes = run_bundles(&toolchain, &bundles, &ctx, &ctx.output_root, &mut entry_points)
            .await
            .unwrap();

        let recorded = toolchain.bundles.lock().unwrap();
        assert_eq!(recorded[1].output, ctx.output_root.join("bundles/widgets.umd.temp.js"));
        assert!(!ctx.output_root.join("bundles/widgets.umd.temp.js").exists());
        assert!(ctx.output_root.join("bundles/widgets.umd.js").is_file());
        assert_eq!(
            outcomes[1].status,
            BundleStatus::Built {
                output: ctx.output_root.join("bundles/widgets.umd.js"),
                minified: Some(ctx.output_root.join("bundles/widgets.umd.min.js")),
            }
        );
        assert!(ctx.output_root.join("bundles/widgets.umd.min.js").is_file());
        assert_eq!(entry_points.get("main"), Some("bundles/widgets.umd.js"));
        assert_eq!(entry_points.get("es2015"), Some("fesm2015/widgets.js"));
    }

    #[tokio::test]
    async fn test_failed_transform_does_not_stop_the_next() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path());
        let project = project(
            r#"{ "bundles": [
                { "libraryTarget": "umd", "entry": "src/index.js", "scriptTarget": "es5" },
                { "libraryTarget": "cjs", "entry": "src/index.js", "scriptTarget": "es5" }
            ] }"#,
        );
        let toolchain = RecordingToolchain {
            fail_transform: Some(ctx.output_root.join("bundles/widgets.umd.js")),
            ..RecordingToolchain::default()
        };

        let bundles = resolve_bundles(&project, &ctx, &[]).unwrap();
        assert!(bundles[0].needs_transform());
        assert!(bundles[1].needs_transform());

        let mut entry_points = PackageEntryPoints::new();
        let outcomes = run_bundles(&toolchain, &bundles, &ctx, &ctx.output_root, &mut entry_points)
            .await
            .unwrap();

        match &outcomes[0].status {
            BundleStatus::Failed { message } => assert!(message.contains("TS1005")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(matches!(outcomes[1].status, BundleStatus::Built { .. }));
        assert_eq!(toolchain.bundles.lock().unwrap().len(), 2);
        assert!(!ctx.output_root.join("bundles/widgets.umd.js").exists());
        assert!(ctx.output_root.join("bundles/widgets.cjs.js").is_file());
        assert_eq!(entry_points.get("main"), Some("bundles/widgets.cjs.js"));
    }

    #[tokio::test]
    async fn test_deep_imports_of_installed_packages_stay_external() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = context(temp_dir.path());
        ctx.installed.push("lodash".to_string());
        std::fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        std::fs::write(
            temp_dir.path().join("src/index.js"),
            "import fp from 'lodash/fp';\nimport { helper } from './helper';\nexport const a = fp;\n",
        )
        .unwrap();
        let project = project(r#"{ "bundles": [ { "libraryTarget": "esm", "entry": "src/index.js" } ] }"#);
        let toolchain = RecordingToolchain::default();

        let bundles = resolve_bundles(&project, &ctx, &[]).unwrap();
        assert!(bundles[0].externals.match_subpaths);
        let mut entry_points = PackageEntryPoints::new();
        run_bundles(&toolchain, &bundles, &ctx, &ctx.output_root, &mut entry_points)
            .await
            .unwrap();

        let recorded = toolchain.bundles.lock().unwrap();
        let modules = &recorded[0].externals.modules;
        assert!(modules.contains(&"lodash".to_string()));
        assert!(modules.contains(&"lodash/fp".to_string()));
        assert!(!modules.iter().any(|m| m.starts_with('.')));
    }
}
