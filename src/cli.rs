use std::path::PathBuf;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

/// Build publishable JavaScript/TypeScript library packages
#[derive(Parser)]
#[command(
    name = "libpack",
    version,
    about = "Build publishable JavaScript/TypeScript library packages",
    long_about = "libpack runs a library's compiler targets and bundle targets in order, inlines component templates and styles, transforms bundles between language tiers, minifies them and writes the published package.json with its entry points."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the library described by a project file
    Build {
        /// Project file (defaults to the configured one, `libpack.json`)
        #[arg(short, long, value_name = "FILE")]
        project: Option<PathBuf>,

        /// Override source map emission
        #[arg(long)]
        source_map: Option<bool>,

        /// Remove the output directory first
        #[arg(long)]
        clean: bool,

        /// Hide the progress spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Resolve and print every target without running any tool
    Plan {
        /// Project file (defaults to the configured one, `libpack.json`)
        #[arg(short, long, value_name = "FILE")]
        project: Option<PathBuf>,
    },

    /// Initialize libpack configuration
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
}
