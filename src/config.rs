use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tool-level settings (`libpack.toml`): which executables to run and how.
///
/// Project descriptions live in a separate JSON file, see [`crate::project`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External executables
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Minifier configuration
    #[serde(default)]
    pub minify: MinifyConfig,

    /// Style processing configuration
    #[serde(default)]
    pub styles: StyleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Build defaults
    #[serde(default)]
    pub build: BuildDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Plain compiler
    #[serde(default = "default_tsc")]
    pub tsc: String,

    /// Ahead-of-time compiler variant that also emits metadata
    #[serde(default = "default_ngc")]
    pub ngc: String,

    /// Dependency-graph bundler
    #[serde(default = "default_rollup")]
    pub rollup: String,

    /// Loader/plugin based bundler
    #[serde(default = "default_webpack")]
    pub webpack: String,

    /// Sass/SCSS compiler
    #[serde(default = "default_sass")]
    pub sass: String,

    /// Less compiler
    #[serde(default = "default_lessc")]
    pub lessc: String,

    /// External script minifier
    #[serde(default = "default_terser")]
    pub terser: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinifyEngine {
    /// In-process minifier, keeps license comments, emits no source map
    #[default]
    Builtin,
    /// External terser process with two compress passes
    Terser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinifyConfig {
    #[serde(default)]
    pub engine: MinifyEngine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Assets referenced by `url(...)` up to this many bytes are inlined as data URIs
    #[serde(default = "default_inline_url_limit")]
    pub inline_url_limit: u64,

    /// Oldest browser major versions vendor prefixes are generated for
    #[serde(default)]
    pub browsers: BrowserTargets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserTargets {
    pub chrome: Option<u32>,
    pub edge: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub ios_saf: Option<u32>,
    pub ie: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildDefaults {
    /// Project file looked up when none is given on the command line
    #[serde(default = "default_project_file")]
    pub project_file: PathBuf,

    /// Emit and re-chain source maps unless the project says otherwise
    #[serde(default = "default_source_maps")]
    pub source_maps: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tsc: default_tsc(),
            ngc: default_ngc(),
            rollup: default_rollup(),
            webpack: default_webpack(),
            sass: default_sass(),
            lessc: default_lessc(),
            terser: default_terser(),
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            inline_url_limit: default_inline_url_limit(),
            browsers: BrowserTargets::default(),
        }
    }
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(61),
            edge: Some(16),
            firefox: Some(60),
            safari: Some(11),
            ios_saf: Some(11),
            ie: Some(11),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: default_log_filter(),
        }
    }
}

impl Default for BuildDefaults {
    fn default() -> Self {
        Self {
            project_file: default_project_file(),
            source_maps: default_source_maps(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::find_config_file()?,
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Initialize configuration file
    pub fn init(output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

        let config_path = output_dir.join("libpack.toml");
        let config = Config::default();

        let content = toml::to_string_pretty(&config)
            .context("Failed to serialize default configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(config_path)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Result<PathBuf> {
        let current_dir = std::env::current_dir()
            .context("Failed to get current directory")?;

        // Look for libpack.toml in current directory and parents
        let mut dir = current_dir.as_path();
        loop {
            let config_path = dir.join("libpack.toml");
            if config_path.exists() {
                return Ok(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("libpack").join("config.toml");
            if config_path.exists() {
                return Ok(config_path);
            }
        }

        // Return default path (may not exist)
        Ok(current_dir.join("libpack.toml"))
    }
}

// Default value functions
fn default_tsc() -> String {
    "tsc".to_string()
}

fn default_ngc() -> String {
    "ngc".to_string()
}

fn default_rollup() -> String {
    "rollup".to_string()
}

fn default_webpack() -> String {
    "webpack".to_string()
}

fn default_sass() -> String {
    "sass".to_string()
}

fn default_lessc() -> String {
    "lessc".to_string()
}

fn default_terser() -> String {
    "terser".to_string()
}

fn default_inline_url_limit() -> u64 {
    10 * 1024 // 10KB
}

fn default_log_filter() -> String {
    "libpack=info".to_string()
}

fn default_project_file() -> PathBuf {
    PathBuf::from("libpack.json")
}

fn default_source_maps() -> bool {
    true
}
