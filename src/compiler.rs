//! Compiler stage: runs every transpilation target in order and applies the
//! post-compile fixups (version placeholder, resource inlining, typings
//! relocation and root re-exports).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::{LibpackError, Result};
use crate::inliner::{DEFAULT_SCRIPT_PATTERN, InlineRequest, ResourceInliner};
use crate::pipeline::BuildContext;
use crate::project::{CompilerKind, LibraryProjectConfig, TranspilationTarget};
use crate::script_target::ScriptTarget;
use crate::styles::StyleProcessor;
use crate::toolchain::{CompileJob, LocalizationFlags, Toolchain};
use crate::tsconfig::CompilerConfig;

static VERSION_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(export\s+(?:const|var|let)\s+VERSION\s*(?::\s*[\w.]+\s*)?=\s*(?:new\s+(?:[\w$]+\.)?Version\s*\(\s*)?)(['"])0\.0\.0-PLACEHOLDER(['"])"#,
    )
    .expect("valid regex")
});

const TYPINGS_SHIM_TEMPLATE: &str = "export * from '{{{from}}}';\n";

const METADATA_REDIRECT_TEMPLATE: &str = r#"{"__symbolic":"module","version":4,"metadata":{},"exports":[{"from":"{{{from}}}"}],"flatModuleIndexRedirect":true{{#if import_as}},"importAs":"{{{import_as}}}"{{/if}}}
"#;

/// A transpilation target with everything resolved.
#[derive(Debug, Clone)]
pub struct TranspilationPlan {
    pub index: usize,
    pub compiler: CompilerKind,
    pub config: CompilerConfig,
    pub out_dir: PathBuf,
    pub target: ScriptTarget,
    pub declaration: bool,
    pub localization: LocalizationFlags,
    pub settings: TranspilationTarget,
}

impl TranspilationPlan {
    /// The compiled module re-exporting the public API.
    pub fn entry_file(&self) -> PathBuf {
        crate::paths::normalize(&self.out_dir.join(self.config.entry_relative()).with_extension("js"))
    }

    pub fn emits_metadata(&self) -> bool {
        self.compiler == CompilerKind::Ngc && self.config.emits_metadata()
    }
}

/// Result of one transpilation target; flags carry forward to the next one.
#[derive(Debug, Clone)]
pub struct TranspilationOutcome {
    pub plan: TranspilationPlan,
    pub replaced_version: bool,
    pub inlined_resources: bool,
    /// Declaration entry, when declarations were emitted.
    pub typings: Option<PathBuf>,
}

/// Resolve every transpilation target. The compiler configuration is the
/// target's own, else the previous target's, else the auto-detected one.
pub fn plan_transpilations(project: &LibraryProjectConfig, ctx: &BuildContext) -> Result<Vec<TranspilationPlan>> {
    let mut plans: Vec<TranspilationPlan> = Vec::with_capacity(project.ts_transpilations.len());

    for (index, settings) in project.ts_transpilations.iter().enumerate() {
        let location = format!("tsTranspilations[{}]", index);
        let config = match (&settings.ts_config, plans.last()) {
            (Some(path), _) => CompilerConfig::load(path)?,
            (None, Some(previous)) => previous.config.clone(),
            (None, None) => {
                let found = CompilerConfig::find(&ctx.root).ok_or_else(|| {
                    LibpackError::invalid_config_at(&location, "no compiler configuration found")
                })?;
                debug!("Auto-detected compiler configuration {}", found.display());
                CompilerConfig::load(&found)?
            }
        };

        let target = settings
            .target
            .or_else(|| config.script_target())
            .unwrap_or(ScriptTarget::Es5);
        let declaration = settings.declaration.unwrap_or_else(|| config.declaration());
        let compiler = settings.compiler.unwrap_or(if config.is_aot() {
            CompilerKind::Ngc
        } else {
            CompilerKind::Tsc
        });

        let out_dir = match &settings.out_dir {
            Some(dir) => {
                let resolved = crate::tokens::resolve_tokens(&dir.to_string_lossy(), &ctx.identity, None);
                crate::paths::normalize(&ctx.output_root.join(resolved))
            }
            None => ctx.output_root.join(format!("esm{}", target.suffix())),
        };

        let localization = LocalizationFlags {
            i18n_file: settings.i18n_file.clone(),
            i18n_format: settings.i18n_format.clone(),
            locale: settings.locale.clone(),
            missing_translation: settings.missing_translation.clone(),
        };
        if compiler == CompilerKind::Tsc && !localization.is_empty() {
            return Err(LibpackError::invalid_config_at(
                location,
                "localization options require the ahead-of-time compiler",
            ));
        }

        plans.push(TranspilationPlan {
            index,
            compiler,
            config,
            out_dir,
            target,
            declaration,
            localization,
            settings: settings.clone(),
        });
    }

    Ok(plans)
}

/// Run the compiler stage. Any failure aborts the build.
pub async fn run_transpilations<T: Toolchain>(
    toolchain: &T,
    plans: Vec<TranspilationPlan>,
    ctx: &BuildContext,
    include_paths: &[PathBuf],
) -> Result<Vec<TranspilationOutcome>> {
    let mut outcomes: Vec<TranspilationOutcome> = Vec::with_capacity(plans.len());
    // Whether the last target that attempted a fixup found something to fix.
    // Targets with the fixup turned off pass it through unchanged.
    let mut forward_version = true;
    let mut forward_inlining = true;

    for plan in plans {
        info!(
            "Compiling tsTranspilations[{}] with {:?} at {} into {}",
            plan.index,
            plan.compiler,
            plan.target,
            plan.out_dir.display()
        );

        toolchain
            .compile(&CompileJob {
                compiler: plan.compiler,
                config_path: plan.config.path.clone(),
                out_dir: plan.out_dir.clone(),
                target: plan.target,
                declaration: plan.declaration,
                localization: plan.localization.clone(),
                working_dir: plan.config.dir().to_path_buf(),
            })
            .await?;

        let try_version = plan.settings.replace_version_placeholder && forward_version;
        let replaced_version = if try_version {
            let replaced = replace_version_placeholder(&plan.out_dir, &ctx.version)?;
            forward_version = replaced;
            replaced
        } else {
            false
        };

        let try_inlining = plan.settings.enable_resource_inlining && forward_inlining;
        let inlined_resources = if try_inlining {
            let styles = StyleProcessor::new(toolchain, &ctx.tools.styles, include_paths);
            let source_root = plan.config.source_root();
            let inlined = ResourceInliner::new(styles)
                .run(&InlineRequest {
                    search_root: &plan.out_dir,
                    pattern: DEFAULT_SCRIPT_PATTERN,
                    source_root: &source_root,
                    metadata: plan.emits_metadata(),
                })
                .await?
                .replaced;
            forward_inlining = inlined;
            inlined
        } else {
            false
        };

        let typings = if plan.declaration {
            Some(place_typings(&plan, ctx)?)
        } else {
            None
        };

        outcomes.push(TranspilationOutcome {
            plan,
            replaced_version,
            inlined_resources,
            typings,
        });
    }

    Ok(outcomes)
}

/// Rewrite the exported `VERSION` placeholder in every emitted script under `dir`.
pub fn replace_version_placeholder(dir: &Path, version: &str) -> Result<bool> {
    let mut replaced = false;
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_script = path
            .extension()
            .map(|e| e == "js" || e == "mjs")
            .unwrap_or(false);
        if !entry.file_type().is_file() || !is_script {
            continue;
        }

        let code = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
        if !VERSION_PLACEHOLDER.is_match(&code) {
            continue;
        }
        let rewritten = VERSION_PLACEHOLDER.replace_all(&code, |caps: &regex::Captures| {
            format!("{}{}{}{}", &caps[1], &caps[2], version, &caps[3])
        });
        std::fs::write(path, rewritten.as_ref()).map_err(LibpackError::io(path))?;
        debug!("Replaced version placeholder in {}", path.display());
        replaced = true;
    }
    Ok(replaced)
}

/// Relocate and re-export typings as requested; returns the declaration entry.
fn place_typings(plan: &TranspilationPlan, ctx: &BuildContext) -> Result<PathBuf> {
    let mut typings_dir = plan.out_dir.clone();
    if plan.settings.move_typings_and_metadata_to_root_out_dir && plan.out_dir != ctx.output_root {
        move_typings(&plan.out_dir, &ctx.output_root)?;
        typings_dir = ctx.output_root.clone();
    }

    let entry = typings_dir.join(plan.config.entry_relative());
    if plan.settings.re_export_typings_and_metadata_to_root_out_dir {
        write_root_reexport(&entry, plan, ctx)
    } else {
        Ok(crate::paths::normalize(&entry.with_extension("d.ts")))
    }
}

fn is_typings_file(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".d.ts") || name.ends_with(".metadata.json")
}

/// Move every `.d.ts` and `.metadata.json` under `from` into `to`, keeping relative structure.
pub fn move_typings(from: &Path, to: &Path) -> Result<usize> {
    let files: Vec<PathBuf> = WalkDir::new(from)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_typings_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    for file in &files {
        let rel = file.strip_prefix(from).unwrap_or(file);
        let target = to.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(LibpackError::io(parent))?;
        }
        if std::fs::rename(file, &target).is_err() {
            std::fs::copy(file, &target).map_err(LibpackError::io(&target))?;
            std::fs::remove_file(file).map_err(LibpackError::io(file))?;
        }
    }
    info!("Moved {} typing file(s) to {}", files.len(), to.display());
    Ok(files.len())
}

/// Write `<output>/<package-name>.d.ts` (and the metadata redirect) pointing at `entry`.
fn write_root_reexport(entry: &Path, plan: &TranspilationPlan, ctx: &BuildContext) -> Result<PathBuf> {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string("typings", TYPINGS_SHIM_TEMPLATE)
        .map_err(|e| LibpackError::internal(e.to_string()))?;
    handlebars
        .register_template_string("metadata", METADATA_REDIRECT_TEMPLATE)
        .map_err(|e| LibpackError::internal(e.to_string()))?;

    let from = format!("./{}", crate::paths::manifest_relative(entry, &ctx.output_root));
    let context = json!({
        "from": from,
        "import_as": plan.config.flat_module_id(),
    });

    let shim = ctx.output_root.join(format!("{}.d.ts", ctx.identity.package_name));
    let rendered = handlebars
        .render("typings", &context)
        .map_err(|e| LibpackError::internal(e.to_string()))?;
    std::fs::create_dir_all(&ctx.output_root).map_err(LibpackError::io(&ctx.output_root))?;
    std::fs::write(&shim, rendered).map_err(LibpackError::io(&shim))?;
    debug!("Wrote {}", shim.display());

    if plan.emits_metadata() {
        let redirect = ctx.output_root.join(format!("{}.metadata.json", ctx.identity.package_name));
        let rendered = handlebars
            .render("metadata", &context)
            .map_err(|e| LibpackError::internal(e.to_string()))?;
        std::fs::write(&redirect, rendered).map_err(LibpackError::io(&redirect))?;
        debug!("Wrote {}", redirect.display());
    }

    Ok(shim)
}
