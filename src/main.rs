use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libpack::bundler::BundleStatus;
use libpack::cli::{self, Cli, Commands};
use libpack::config::{Config, LogFormat, LoggingConfig};
use libpack::{LibraryBuilder, LibraryProjectConfig, ProcessToolchain};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    init_tracing(&config.logging, cli.verbose)?;
    info!("Starting libpack v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Build {
            project,
            source_map,
            clean,
            no_progress,
        } => {
            let mut project = load_project(project.as_deref(), &config)?;
            if source_map.is_some() {
                project.source_map = source_map;
            }
            project.clean |= clean;

            let toolchain = ProcessToolchain::new(config.tools.clone(), &project.root);
            let builder = LibraryBuilder::new(toolchain, project, config);

            let spinner = (!no_progress).then(|| {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner.set_message("Building library...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner
            });

            let result = builder.build().await;
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            match result {
                Ok(report) => {
                    println!(
                        "{} {} in {}ms (build {})",
                        "✓".green().bold(),
                        report.output_root.display(),
                        report.elapsed.as_millis(),
                        report.build_id
                    );
                    for outcome in &report.bundles {
                        match &outcome.status {
                            BundleStatus::Built { output, minified } => {
                                println!("  {} bundles[{}] {}", "✓".green(), outcome.index, relative(output, &report.output_root));
                                if let Some(minified) = minified {
                                    println!("      {}", relative(minified, &report.output_root).dimmed());
                                }
                            }
                            BundleStatus::Failed { message } => {
                                println!("  {} bundles[{}] {}", "✗".red(), outcome.index, message.red());
                            }
                        }
                    }
                    println!("  {} {}", "manifest".cyan(), report.manifest_path.display());

                    if !report.is_success() {
                        warn!("{} bundle target(s) failed", report.failed_bundles().count());
                    }
                }
                Err(e) => {
                    eprintln!("{} Build failed: {}", "✗".red().bold(), e.report());
                    std::process::exit(1);
                }
            }
        }

        Commands::Plan { project } => {
            let project = load_project(project.as_deref(), &config)?;
            let toolchain = ProcessToolchain::new(config.tools.clone(), &project.root);
            let builder = LibraryBuilder::new(toolchain, project, config);

            match builder.plan() {
                Ok(plan) => {
                    println!(
                        "{} {} {} -> {}",
                        "plan".cyan().bold(),
                        plan.context.identity.full_name,
                        plan.context.version,
                        plan.context.output_root.display()
                    );
                    for line in plan.describe() {
                        println!("  {}", line);
                    }
                }
                Err(e) => {
                    eprintln!("{} Plan failed: {}", "✗".red().bold(), e.report());
                    std::process::exit(1);
                }
            }
        }

        Commands::Init { output_dir } => {
            let path = Config::init(&output_dir)?;
            info!("Initialized libpack configuration in {}", path.display());
        }

        Commands::Completions { shell } => {
            cli::generate_completions(shell);
        }
    }

    Ok(())
}

fn load_project(explicit: Option<&Path>, config: &Config) -> Result<LibraryProjectConfig> {
    let path: PathBuf = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.build.project_file.clone());
    if !path.is_file() {
        anyhow::bail!("Project file not found: {}", path.display());
    }
    LibraryProjectConfig::load(&path).with_context(|| format!("Failed to load project file: {}", path.display()))
}

fn relative(path: &Path, base: &Path) -> String {
    libpack::paths::manifest_relative(path, base)
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("libpack=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.filter))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("Failed to initialize logging")?;

    Ok(())
}
