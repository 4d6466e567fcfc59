//! Build orchestration: compiler stage, bundle stage, manifest.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::bundler::{BundleOutcome, BundleStatus, ResolvedBundle, resolve_bundles, run_bundles};
use crate::compiler::{TranspilationOutcome, TranspilationPlan, plan_transpilations, run_transpilations};
use crate::config::Config;
use crate::errors::{LibpackError, Result};
use crate::manifest::{self, PackageEntryPoints};
use crate::project::LibraryProjectConfig;
use crate::styles::StyleProcessor;
use crate::tokens::ProjectIdentity;
use crate::toolchain::Toolchain;

/// Everything the stages share for one build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub build_id: Uuid,
    pub root: PathBuf,
    /// Output directory with tokens resolved.
    pub output_root: PathBuf,
    pub identity: ProjectIdentity,
    pub version: String,
    pub source_maps: bool,
    /// `dependencies` and `peerDependencies` of the project manifest.
    pub installed: Vec<String>,
    pub tools: Config,
}

/// The resolved work of a build, before anything runs.
#[derive(Debug)]
pub struct BuildPlan {
    pub context: BuildContext,
    pub package_dir: PathBuf,
    pub transpilations: Vec<TranspilationPlan>,
    pub bundles: Vec<ResolvedBundle>,
}

impl BuildPlan {
    /// Human-readable lines, one per target.
    pub fn describe(&self) -> Vec<String> {
        let root = &self.context.output_root;
        let mut lines: Vec<String> = self
            .transpilations
            .iter()
            .map(|plan| {
                format!(
                    "tsTranspilations[{}] {:?} {} -> {}",
                    plan.index,
                    plan.compiler,
                    plan.target,
                    crate::paths::manifest_relative(&plan.out_dir, root)
                )
            })
            .collect();
        lines.extend(self.bundles.iter().map(|b| crate::bundler::describe(b, root)));
        lines
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub output_root: PathBuf,
    pub transpilations: Vec<TranspilationOutcome>,
    pub bundles: Vec<BundleOutcome>,
    pub entry_points: PackageEntryPoints,
    pub manifest_path: PathBuf,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn failed_bundles(&self) -> impl Iterator<Item = &BundleOutcome> {
        self.bundles
            .iter()
            .filter(|o| matches!(o.status, BundleStatus::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed_bundles().next().is_none()
    }
}

struct Manifests {
    project: Value,
    root: Option<Value>,
}

/// Builds one library project with the given toolchain.
pub struct LibraryBuilder<T: Toolchain> {
    toolchain: T,
    project: LibraryProjectConfig,
    config: Config,
}

impl<T: Toolchain> LibraryBuilder<T> {
    pub fn new(toolchain: T, project: LibraryProjectConfig, config: Config) -> Self {
        Self {
            toolchain,
            project,
            config,
        }
    }

    pub fn project(&self) -> &LibraryProjectConfig {
        &self.project
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    fn read_manifests(&self) -> Result<Manifests> {
        let project = manifest::read_manifest(&self.project.package_json)?;
        let root = match manifest::find_root_manifest(&self.project.root, self.project.root_package_json.as_deref()) {
            Some(path) if path != self.project.package_json => {
                debug!("Root manifest {}", path.display());
                Some(manifest::read_manifest(&path)?)
            }
            _ => None,
        };
        Ok(Manifests { project, root })
    }

    fn context(&self, manifests: &Manifests) -> Result<BuildContext> {
        let name = manifests
            .project
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                LibpackError::invalid_config(format!(
                    "{} has no package name",
                    self.project.package_json.display()
                ))
            })?;
        let identity = ProjectIdentity::from_package_name(name);
        let version = manifest::resolve_version(
            self.project.version.as_deref(),
            manifests.root.as_ref(),
            &manifests.project,
        )?;
        let output_root = resolve_dir(&self.project.output_path, &identity);

        Ok(BuildContext {
            build_id: Uuid::new_v4(),
            root: self.project.root.clone(),
            output_root,
            identity,
            version,
            source_maps: self.project.source_map.unwrap_or(self.config.build.source_maps),
            installed: manifest::installed_packages(&manifests.project),
            tools: self.config.clone(),
        })
    }

    /// Resolve every target without running a tool.
    pub fn plan(&self) -> Result<BuildPlan> {
        let manifests = self.read_manifests()?;
        let context = self.context(&manifests)?;
        self.plan_with(context)
    }

    fn plan_with(&self, context: BuildContext) -> Result<BuildPlan> {
        let transpilations = plan_transpilations(&self.project, &context)?;
        let bundles = resolve_bundles(&self.project, &context, &transpilations)?;
        let package_dir = self
            .project
            .package_json_out_dir
            .as_deref()
            .map(|dir| resolve_dir(dir, &context.identity))
            .unwrap_or_else(|| context.output_root.clone());
        Ok(BuildPlan {
            context,
            package_dir,
            transpilations,
            bundles,
        })
    }

    /// Run the whole pipeline. Compiler and configuration failures abort;
    /// failed bundle targets are reported and the manifest is still written.
    pub async fn build(&self) -> Result<BuildReport> {
        let manifests = self.read_manifests()?;
        let context = self.context(&manifests)?;
        let span = info_span!("build", id = %context.build_id, package = %context.identity.full_name);
        self.run(context, manifests).instrument(span).await
    }

    async fn run(&self, context: BuildContext, manifests: Manifests) -> Result<BuildReport> {
        let started = Instant::now();
        info!("Building {} {}", context.identity.full_name, context.version);

        // Plan first: configuration errors must surface before the output is touched.
        let plan = self.plan_with(context)?;
        let ctx = &plan.context;

        if self.project.clean {
            clean_output(&ctx.output_root, &ctx.root).await?;
        }
        tokio::fs::create_dir_all(&ctx.output_root)
            .await
            .map_err(LibpackError::io(&ctx.output_root))?;

        copy_assets(&self.project.copy, &ctx.output_root)?;

        let include_paths = &self.project.style_preprocessor_options.include_paths;
        if !self.project.styles.is_empty() {
            let styles = StyleProcessor::new(&self.toolchain, &ctx.tools.styles, include_paths);
            for entry in &self.project.styles {
                let css = styles.process(&entry.input).await?;
                let output = match &entry.output {
                    Some(output) => ctx.output_root.join(output),
                    None => ctx
                        .output_root
                        .join(format!("{}.css", crate::paths::file_stem(&entry.input))),
                };
                if let Some(parent) = output.parent() {
                    std::fs::create_dir_all(parent).map_err(LibpackError::io(parent))?;
                }
                std::fs::write(&output, css).map_err(LibpackError::io(&output))?;
                info!("Wrote stylesheet {}", output.display());
            }
        }

        let mut entry_points = PackageEntryPoints::new();
        let transpilations =
            run_transpilations(&self.toolchain, plan.transpilations.clone(), ctx, include_paths).await?;
        for outcome in &transpilations {
            entry_points.register_transpilation(outcome.plan.target, &outcome.plan.entry_file(), &plan.package_dir);
            if let Some(typings) = &outcome.typings {
                entry_points.register_typings(typings, &plan.package_dir);
            }
        }

        let bundles = run_bundles(&self.toolchain, &plan.bundles, ctx, &plan.package_dir, &mut entry_points).await?;

        let published = manifest::synthesize(&manifests.project, manifests.root.as_ref(), &ctx.version, &entry_points)?;
        let manifest_path = manifest::write_manifest(&published, &plan.package_dir)?;

        let report = BuildReport {
            build_id: ctx.build_id,
            output_root: ctx.output_root.clone(),
            transpilations,
            bundles,
            entry_points,
            manifest_path,
            elapsed: started.elapsed(),
        };
        if report.is_success() {
            info!("Build finished in {}ms", report.elapsed.as_millis());
        } else {
            warn!(
                "Build finished in {}ms with {} failed bundle target(s)",
                report.elapsed.as_millis(),
                report.failed_bundles().count()
            );
        }
        Ok(report)
    }
}

fn resolve_dir(dir: &Path, identity: &ProjectIdentity) -> PathBuf {
    let resolved = crate::tokens::resolve_tokens(&dir.to_string_lossy(), identity, None);
    crate::paths::normalize(Path::new(&resolved))
}

/// Remove the output directory. Refuses when it is, or contains, the project root.
pub async fn clean_output(output_root: &Path, project_root: &Path) -> Result<()> {
    if project_root.starts_with(output_root) {
        return Err(LibpackError::invalid_config_at(
            "outputPath",
            format!(
                "refusing to clean {}: it contains the project root",
                output_root.display()
            ),
        ));
    }
    if output_root.exists() {
        info!("Cleaning {}", output_root.display());
        tokio::fs::remove_dir_all(output_root)
            .await
            .map_err(LibpackError::io(output_root))?;
    }
    Ok(())
}

/// Copy files and directories into `output_root`, keyed by their own name.
pub fn copy_assets(assets: &[PathBuf], output_root: &Path) -> Result<()> {
    for asset in assets {
        let Some(name) = asset.file_name() else {
            continue;
        };
        if asset.is_file() {
            let target = output_root.join(name);
            std::fs::copy(asset, &target).map_err(LibpackError::io(&target))?;
            debug!("Copied {}", asset.display());
        } else if asset.is_dir() {
            for entry in WalkDir::new(asset).into_iter().filter_map(|e| e.ok()) {
                let rel = entry.path().strip_prefix(asset).unwrap_or(entry.path());
                let target = output_root.join(name).join(rel);
                if entry.file_type().is_dir() {
                    std::fs::create_dir_all(&target).map_err(LibpackError::io(&target))?;
                } else if entry.file_type().is_file() {
                    std::fs::copy(entry.path(), &target).map_err(LibpackError::io(&target))?;
                }
            }
            debug!("Copied directory {}", asset.display());
        } else {
            return Err(LibpackError::invalid_config_at(
                "copy",
                format!("{} does not exist", asset.display()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clean_refuses_project_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("lib");
        std::fs::create_dir_all(&root).unwrap();

        assert!(clean_output(&root, &root).await.is_err());
        assert!(clean_output(temp_dir.path(), &root).await.is_err());
        assert!(root.exists());

        let dist = root.join("dist");
        std::fs::create_dir_all(dist.join("old")).unwrap();
        clean_output(&dist, &root).await.unwrap();
        assert!(!dist.exists());
    }

    #[test]
    fn test_copy_assets() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("README.md"), "# widgets").unwrap();
        std::fs::create_dir_all(root.join("assets/icons")).unwrap();
        std::fs::write(root.join("assets/icons/add.svg"), "<svg/>").unwrap();
        let out = root.join("dist");
        std::fs::create_dir_all(&out).unwrap();

        copy_assets(&[root.join("README.md"), root.join("assets")], &out).unwrap();
        assert!(out.join("README.md").is_file());
        assert!(out.join("assets/icons/add.svg").is_file());

        let err = copy_assets(&[root.join("LICENSE")], &out).unwrap_err();
        assert!(matches!(err, LibpackError::InvalidConfig { .. }));
    }

    #[test]
    fn test_resolve_dir_tokens() {
        let identity = ProjectIdentity::from_package_name("@acme/widgets");
        assert_eq!(
            resolve_dir(Path::new("/p/dist/packages/[package-scope]/[package-name]"), &identity),
            PathBuf::from("/p/dist/packages/acme/widgets")
        );
    }
}
