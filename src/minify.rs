//! Standalone minification of bundle outputs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::MinifyEngine;
use crate::errors::{LibpackError, Result};
use crate::script_target::{ModuleFormat, ScriptTarget};
use crate::sourcemap::{compose_file_map, map_path_for, strip_source_mapping_url};
use crate::toolchain::{MinifyJob, Toolchain};

static LICENSE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)/\*(?:!.*?|[^*]*?(?:@license|@preserve|@cc_on).*?)\*/").expect("valid regex")
});

/// Explicit flag wins; otherwise UMD bundles at a legacy tier get minified.
pub fn should_minify(explicit: Option<bool>, format: ModuleFormat, destination: ScriptTarget) -> bool {
    explicit.unwrap_or(format == ModuleFormat::Umd && destination.is_legacy())
}

/// `<dir>/<stem>.min.js`
pub fn minified_path(output: &Path) -> PathBuf {
    output.with_file_name(format!("{}.min.js", crate::paths::file_stem(output)))
}

/// Minify `input` next to itself and return the minified file's path.
pub async fn minify_output<T: Toolchain>(
    toolchain: &T,
    engine: MinifyEngine,
    input: &Path,
    source_map: bool,
) -> Result<PathBuf> {
    let output = minified_path(input);
    info!("Minifying {}", input.display());

    match engine {
        MinifyEngine::Builtin => {
            let code = tokio::fs::read_to_string(input)
                .await
                .map_err(LibpackError::io(input))?;
            let minified = minify_builtin(&code)?;
            tokio::fs::write(&output, minified)
                .await
                .map_err(LibpackError::io(&output))?;
            debug!("Built-in minifier emits no source map for {}", output.display());
        }
        MinifyEngine::Terser => {
            toolchain
                .minify(&MinifyJob {
                    input: input.to_path_buf(),
                    output: output.clone(),
                    source_map,
                })
                .await?;
            let map_path = map_path_for(&output);
            if source_map && map_path.is_file() {
                compose_file_map(&map_path)?;
            }
        }
    }

    Ok(output)
}

/// In-process minification keeping license comments in front of the code.
pub fn minify_builtin(code: &str) -> Result<String> {
    let licenses: Vec<&str> = LICENSE_COMMENT.find_iter(code).map(|m| m.as_str()).collect();
    let body = strip_source_mapping_url(&LICENSE_COMMENT.replace_all(code, ""));

    let minified = minifier::js::minify(&body).to_string();
    if minified.trim().is_empty() && !body.trim().is_empty() {
        return Err(LibpackError::minify("minifier produced no output"));
    }

    let mut out = licenses.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(minified.trim());
    out.push('\n');
    Ok(out)
}
