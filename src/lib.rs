//! libpack - build publishable JavaScript/TypeScript library packages
//!
//! A project description lists compiler runs (transpilations) and bundle
//! targets. libpack runs them in order through external tools, inlines
//! component templates and styles, transforms bundles between language
//! tiers, minifies, re-chains source maps and finally writes the published
//! `package.json` with its entry points.
//!
//! # Example
//!
//! ```rust,no_run
//! use libpack::{Config, LibraryBuilder, LibraryProjectConfig, ProcessToolchain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let project = LibraryProjectConfig::load("libpack.json".as_ref())?;
//!     let toolchain = ProcessToolchain::new(config.tools.clone(), &project.root);
//!
//!     let report = LibraryBuilder::new(toolchain, project, config).build().await?;
//!     println!("Wrote {}", report.manifest_path.display());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod bundler;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod edits;
pub mod errors;
pub mod html;
pub mod inliner;
pub mod literal;
pub mod manifest;
pub mod metadata;
pub mod minify;
pub mod paths;
pub mod pipeline;
pub mod project;
pub mod script_target;
pub mod sourcemap;
pub mod styles;
pub mod tokens;
pub mod toolchain;
pub mod transform;
pub mod tsconfig;

pub use config::Config;
pub use errors::{LibpackError, Result};
pub use pipeline::{BuildContext, BuildPlan, BuildReport, LibraryBuilder};
pub use project::LibraryProjectConfig;
pub use script_target::{ModuleFormat, ScriptTarget};
pub use toolchain::{ProcessToolchain, Toolchain};

/// Current version of libpack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
