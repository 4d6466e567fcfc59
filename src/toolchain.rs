//! Contracts for the external tools the pipeline orchestrates, and the
//! process-backed implementation used by the command line.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::{self, BundleJob, BundlerBackend};
use crate::config::ToolsConfig;
use crate::errors::{Diagnostic, DiagnosticCategory, LibpackError, Result};
use crate::project::CompilerKind;
use crate::script_target::{ModuleFormat, ScriptTarget};

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\):\s*)?(?P<cat>error|warning|message)\s+(?P<code>TS\d+):\s*(?P<msg>.*)$",
    )
    .expect("valid regex")
});

/// Localization flags for the ahead-of-time compiler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalizationFlags {
    pub i18n_file: Option<PathBuf>,
    pub i18n_format: Option<String>,
    pub locale: Option<String>,
    pub missing_translation: Option<String>,
}

impl LocalizationFlags {
    pub fn is_empty(&self) -> bool {
        self.i18n_file.is_none()
            && self.i18n_format.is_none()
            && self.locale.is_none()
            && self.missing_translation.is_none()
    }
}

/// One project compile.
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub compiler: CompilerKind,
    pub config_path: PathBuf,
    pub out_dir: PathBuf,
    pub target: ScriptTarget,
    pub declaration: bool,
    pub localization: LocalizationFlags,
    pub working_dir: PathBuf,
}

/// Re-emit one file at another tier.
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub target: ScriptTarget,
    pub module: ModuleFormat,
    pub source_map: bool,
}

/// Minify one file with the external minifier.
#[derive(Debug, Clone)]
pub struct MinifyJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub source_map: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleSyntax {
    Scss,
    Sass,
    Less,
}

/// Compile one preprocessor stylesheet to CSS.
#[derive(Debug, Clone)]
pub struct StyleJob {
    pub path: PathBuf,
    pub syntax: StyleSyntax,
    pub include_paths: Vec<PathBuf>,
}

/// The external stage contracts. Every method is a suspension point of the pipeline.
#[allow(async_fn_in_trait)]
pub trait Toolchain {
    /// Compile a project; `CompileError` with the collected stderr on failure.
    async fn compile(&self, job: &CompileJob) -> Result<()>;

    /// Produce `job.output` with the job's backend.
    async fn bundle(&self, job: &BundleJob) -> Result<()>;

    /// Write `job.destination` (and its map) from `job.source`.
    async fn transform(&self, job: &TransformJob) -> Result<()>;

    /// Write `job.output` (and its map) from `job.input`.
    async fn minify(&self, job: &MinifyJob) -> Result<()>;

    /// Return the compiled CSS.
    async fn preprocess_style(&self, job: &StyleJob) -> Result<String>;
}

/// Captured result of an external process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    /// stderr, or stdout when the tool reports errors there.
    pub fn error_text(&self) -> String {
        let lines = if self.stderr.iter().any(|l| !l.trim().is_empty()) {
            &self.stderr
        } else {
            &self.stdout
        };
        lines.join("\n").trim().to_string()
    }
}

/// Run `program` to completion, passing stdout through at debug level.
pub async fn run_process(program: &Path, args: &[OsString], cwd: &Path) -> Result<ProcessOutput> {
    debug!("Running {} {:?}", program.display(), args);

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| LibpackError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    let stdout: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    let stderr: Vec<String> = String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_string)
        .collect();

    for line in &stdout {
        debug!("{}", line);
    }

    Ok(ProcessOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout,
        stderr,
    })
}

/// Prefer a locally installed binary (`node_modules/.bin`) over one on `PATH`.
pub fn resolve_executable(name: &str, start: &Path) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }

    let file_name = if cfg!(windows) {
        format!("{}.cmd", name)
    } else {
        name.to_string()
    };

    let mut dir = Some(start);
    while let Some(current) = dir {
        let bin = current.join("node_modules").join(".bin").join(&file_name);
        if bin.is_file() {
            return bin;
        }
        dir = current.parent();
    }
    PathBuf::from(name)
}

/// Parse compiler output lines (`file(line,col): error TS1005: msg`).
pub fn parse_diagnostics(lines: &[String]) -> Vec<Diagnostic> {
    lines
        .iter()
        .filter_map(|line| DIAGNOSTIC_LINE.captures(line.trim()))
        .map(|caps| {
            let category = match &caps["cat"] {
                "warning" => DiagnosticCategory::Warning,
                "message" => DiagnosticCategory::Message,
                _ => DiagnosticCategory::Error,
            };
            let mut diagnostic = Diagnostic::error(&caps["msg"]).with_code(&caps["code"]);
            diagnostic.category = category;
            if let (Some(file), Some(line), Some(col)) = (caps.name("file"), caps.name("line"), caps.name("col")) {
                diagnostic = diagnostic.with_location(
                    file.as_str(),
                    line.as_str().parse().unwrap_or(0),
                    col.as_str().parse().unwrap_or(0),
                );
            }
            diagnostic
        })
        .collect()
}

/// Arguments for a project compile.
pub fn compile_args(job: &CompileJob) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-p".into(),
        job.config_path.clone().into(),
        "--outDir".into(),
        job.out_dir.clone().into(),
        "--target".into(),
        job.target.compiler_flag().into(),
    ];
    if job.declaration {
        args.push("--declaration".into());
    } else {
        args.push("--declaration".into());
        args.push("false".into());
    }

    if job.compiler == CompilerKind::Ngc && !job.localization.is_empty() {
        let l = &job.localization;
        if let Some(file) = &l.i18n_file {
            args.push("--i18nFile".into());
            args.push(file.clone().into());
        }
        if let Some(format) = &l.i18n_format {
            args.push("--i18nFormat".into());
            args.push(format.into());
        }
        if let Some(locale) = &l.locale {
            args.push("--locale".into());
            args.push(locale.into());
        }
        if let Some(missing) = &l.missing_translation {
            args.push("--missingTranslation".into());
            args.push(missing.into());
        }
    }
    args
}

/// Toolchain backed by real executables.
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    tools: ToolsConfig,
    project_root: PathBuf,
}

impl ProcessToolchain {
    pub fn new(tools: ToolsConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            project_root: project_root.into(),
        }
    }

    fn executable(&self, name: &str) -> PathBuf {
        resolve_executable(name, &self.project_root)
    }

    async fn bundle_with_graph(&self, job: &BundleJob, options: &backend::GraphBundlerOptions) -> Result<()> {
        let args: Vec<OsString> = backend::graph_bundler_args(job, options)
            .into_iter()
            .map(OsString::from)
            .collect();
        let output = run_process(&self.executable(&self.tools.rollup), &args, &self.project_root).await?;

        for line in output.stderr.iter().filter(|l| l.contains("(!)")) {
            warn!("{}", line.trim());
        }
        if !output.success {
            return Err(backend::graph_bundler_error(&output.stderr));
        }
        Ok(())
    }

    async fn bundle_with_plugins(&self, job: &BundleJob, options: &backend::PluginBundlerOptions) -> Result<()> {
        let config = backend::plugin_bundler_config_merged(job, options)?;
        let out_dir = job.output.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(out_dir).await.map_err(LibpackError::io(out_dir))?;

        let config_path = out_dir.join(format!(".{}.webpack.json", crate::paths::file_stem(&job.output)));
        let content = serde_json::to_string_pretty(&config)?;
        tokio::fs::write(&config_path, content)
            .await
            .map_err(LibpackError::io(&config_path))?;

        let args: Vec<OsString> = vec!["--config".into(), config_path.clone().into(), "--json".into()];
        let result = run_process(&self.executable(&self.tools.webpack), &args, &self.project_root).await;

        if let Err(e) = tokio::fs::remove_file(&config_path).await {
            debug!("Could not remove {}: {}", config_path.display(), e);
        }
        let output = result?;

        let stats: Option<serde_json::Value> = serde_json::from_str(&output.stdout.join("\n")).ok();
        if let Some(err) = stats.as_ref().and_then(backend::plugin_stats_error) {
            return Err(err);
        }
        if !output.success {
            return Err(LibpackError::Bundle {
                message: format!("{} exited with {:?}", self.tools.webpack, output.code),
                details: Some(output.error_text()),
                stack: None,
            });
        }
        Ok(())
    }
}

impl Toolchain for ProcessToolchain {
    async fn compile(&self, job: &CompileJob) -> Result<()> {
        let program = match job.compiler {
            CompilerKind::Tsc => &self.tools.tsc,
            CompilerKind::Ngc => &self.tools.ngc,
        };
        let output = run_process(&self.executable(program), &compile_args(job), &job.working_dir).await?;

        if !output.success {
            let lines: Vec<String> = output.stderr.iter().chain(output.stdout.iter()).cloned().collect();
            return Err(LibpackError::Compile {
                message: output.error_text(),
                diagnostics: parse_diagnostics(&lines),
            });
        }
        Ok(())
    }

    async fn bundle(&self, job: &BundleJob) -> Result<()> {
        match &job.backend {
            BundlerBackend::Graph(options) => self.bundle_with_graph(job, options).await,
            BundlerBackend::Plugin(options) => self.bundle_with_plugins(job, options).await,
        }
    }

    async fn transform(&self, job: &TransformJob) -> Result<()> {
        let dest_dir = job.destination.parent().unwrap_or_else(|| Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".libpack-transform-")
            .tempdir_in(dest_dir)
            .map_err(LibpackError::io(dest_dir))?;

        let mut args: Vec<OsString> = vec![
            job.source.clone().into(),
            "--allowJs".into(),
            "--skipLibCheck".into(),
            "--noEmitOnError".into(),
            "--pretty".into(),
            "false".into(),
            "--target".into(),
            job.target.compiler_flag().into(),
            "--module".into(),
            job.module.compiler_module().into(),
            "--outDir".into(),
            staging.path().into(),
        ];
        if job.source_map {
            args.push("--sourceMap".into());
        }

        let output = run_process(&self.executable(&self.tools.tsc), &args, &self.project_root).await?;
        if !output.success {
            let lines: Vec<String> = output.stdout.iter().chain(output.stderr.iter()).cloned().collect();
            let diagnostics = parse_diagnostics(&lines);
            let message = if diagnostics.is_empty() {
                output.error_text()
            } else {
                diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
            };
            return Err(LibpackError::Compile { message, diagnostics });
        }

        let file_name = job
            .source
            .file_name()
            .ok_or_else(|| LibpackError::internal(format!("transform source has no file name: {}", job.source.display())))?;
        let emitted = staging.path().join(file_name);
        crate::transform::adopt_emitted_file(&emitted, &job.destination, job.source_map).await
    }

    async fn minify(&self, job: &MinifyJob) -> Result<()> {
        let mut args: Vec<OsString> = vec![
            job.input.clone().into(),
            "--compress".into(),
            "passes=2".into(),
            "--mangle".into(),
            "--comments".into(),
            "/^!|@preserve|@license|@cc_on/i".into(),
            "--output".into(),
            job.output.clone().into(),
        ];
        if job.source_map {
            let map_name = format!(
                "{}.map",
                job.output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            );
            args.push("--source-map".into());
            args.push(format!("url='{}'", map_name).into());
        }

        let output = run_process(&self.executable(&self.tools.terser), &args, &self.project_root).await?;
        if !output.success {
            return Err(LibpackError::minify(output.error_text()));
        }
        Ok(())
    }

    async fn preprocess_style(&self, job: &StyleJob) -> Result<String> {
        let (program, mut args): (&str, Vec<OsString>) = match job.syntax {
            StyleSyntax::Scss | StyleSyntax::Sass => {
                let mut args: Vec<OsString> = vec!["--no-source-map".into()];
                for path in &job.include_paths {
                    args.push("--load-path".into());
                    args.push(path.clone().into());
                }
                (&self.tools.sass, args)
            }
            StyleSyntax::Less => {
                let mut args: Vec<OsString> = Vec::new();
                if !job.include_paths.is_empty() {
                    let joined = std::env::join_paths(&job.include_paths)
                        .map_err(|e| LibpackError::invalid_config(format!("invalid include path: {}", e)))?;
                    let mut flag = OsString::from("--include-path=");
                    flag.push(joined);
                    args.push(flag);
                }
                (&self.tools.lessc, args)
            }
        };
        args.push(job.path.clone().into());

        let cwd = job.path.parent().unwrap_or(&self.project_root);
        let output = run_process(&self.executable(program), &args, cwd).await?;
        if !output.success {
            return Err(LibpackError::Style {
                file: job.path.clone(),
                message: output.error_text(),
            });
        }
        Ok(output.stdout.join("\n"))
    }
}
