//! Stylesheet loading, preprocessing and minification.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::{Captures, Regex};
use tracing::debug;

use crate::config::{BrowserTargets, StyleConfig};
use crate::errors::{LibpackError, Result};
use crate::toolchain::{StyleJob, StyleSyntax, Toolchain};

/// Extensions tried, in order, when a referenced stylesheet does not exist as written.
pub const STYLE_EXTENSIONS: [&str; 4] = ["css", "scss", "sass", "less"];

static LICENSE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)/\*(?:!.*?|[^*]*?(?:@license|@preserve).*?)\*/").expect("valid regex")
});
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s]*))\s*\)"#).expect("valid regex")
});

/// Compiles stylesheets into the minified text that gets inlined or written out.
pub struct StyleProcessor<'a, T: Toolchain> {
    toolchain: &'a T,
    config: &'a StyleConfig,
    include_paths: &'a [PathBuf],
}

impl<'a, T: Toolchain> StyleProcessor<'a, T> {
    pub fn new(toolchain: &'a T, config: &'a StyleConfig, include_paths: &'a [PathBuf]) -> Self {
        Self {
            toolchain,
            config,
            include_paths,
        }
    }

    /// Load, preprocess and minify the stylesheet at `requested`.
    pub async fn process(&self, requested: &Path) -> Result<String> {
        let path = resolve_style_path(requested)?;
        let syntax = style_syntax(&path)?;

        let css = match syntax {
            None => std::fs::read_to_string(&path).map_err(LibpackError::io(&path))?,
            Some(syntax) => {
                debug!("Preprocessing {}", path.display());
                self.toolchain
                    .preprocess_style(&StyleJob {
                        path: path.clone(),
                        syntax,
                        include_paths: self.include_paths.to_vec(),
                    })
                    .await?
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let css = inline_urls(&css, base_dir, self.config.inline_url_limit);
        minify_css(&css, &path, &self.config.browsers)
    }
}

/// The file a stylesheet reference points at, trying the sibling extensions in order.
pub fn resolve_style_path(requested: &Path) -> Result<PathBuf> {
    if requested.is_file() {
        return Ok(requested.to_path_buf());
    }
    for ext in STYLE_EXTENSIONS {
        let candidate = requested.with_extension(ext);
        if candidate.is_file() {
            debug!("{} resolved to {}", requested.display(), candidate.display());
            return Ok(candidate);
        }
    }
    Err(LibpackError::file_system_error(
        format!("stylesheet not found: {}", requested.display()),
        requested,
        std::io::Error::from(std::io::ErrorKind::NotFound),
    ))
}

/// `None` for plain CSS, the preprocessor syntax otherwise.
pub fn style_syntax(path: &Path) -> Result<Option<StyleSyntax>> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "css" => Ok(None),
        "scss" => Ok(Some(StyleSyntax::Scss)),
        "sass" => Ok(Some(StyleSyntax::Sass)),
        "less" => Ok(Some(StyleSyntax::Less)),
        _ => Err(LibpackError::UnsupportedFormat {
            file: path.to_path_buf(),
            extension,
        }),
    }
}

/// Replace `url(...)` references to small local files with data URIs.
pub fn inline_urls(css: &str, base_dir: &Path, limit: u64) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures| {
            let original = caps[0].to_string();
            let Some(target) = caps.get(1).or(caps.get(2)).or(caps.get(3)).map(|m| m.as_str()) else {
                return original;
            };
            if target.is_empty()
                || target.starts_with("data:")
                || target.starts_with('#')
                || target.starts_with("//")
                || url::Url::parse(target).is_ok()
            {
                return original;
            }

            let clean = target.split(['?', '#']).next().unwrap_or(target);
            let file = base_dir.join(clean);
            match std::fs::metadata(&file) {
                Ok(meta) if meta.is_file() && meta.len() <= limit => match data_uri(&file) {
                    Some(uri) => format!("url(\"{}\")", uri),
                    None => original,
                },
                _ => original,
            }
        })
        .into_owned()
}

fn data_uri(file: &Path) -> Option<String> {
    let extension = file.extension()?.to_string_lossy().to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => return None,
    };

    let bytes = std::fs::read(file).ok()?;
    if extension == "svg" {
        let text = String::from_utf8(bytes).ok()?;
        Some(format!("data:{};charset=utf-8,{}", mime, urlencoding::encode(&text)))
    } else {
        Some(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }
}

fn to_browsers(targets: &BrowserTargets) -> Browsers {
    let version = |major: Option<u32>| major.map(|m| m << 16);
    Browsers {
        chrome: version(targets.chrome),
        edge: version(targets.edge),
        firefox: version(targets.firefox),
        safari: version(targets.safari),
        ios_saf: version(targets.ios_saf),
        ie: version(targets.ie),
        ..Browsers::default()
    }
}

/// Minify CSS with vendor prefixes for `browsers`, keeping license comments in front.
pub fn minify_css(css: &str, file: &Path, browsers: &BrowserTargets) -> Result<String> {
    let licenses: Vec<String> = LICENSE_COMMENT
        .find_iter(css)
        .map(|m| m.as_str().to_string())
        .collect();
    let body = LICENSE_COMMENT.replace_all(css, "");

    let style_error = |message: String| LibpackError::Style {
        file: file.to_path_buf(),
        message,
    };

    let targets = Targets::from(to_browsers(browsers));
    let mut sheet = StyleSheet::parse(
        &body,
        ParserOptions {
            filename: file.to_string_lossy().into_owned(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| style_error(e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| style_error(e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| style_error(e.to_string()))?;

    let mut out = licenses.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&printed.code);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minify_keeps_license() {
        let css = "/*! acme widgets (c) */\n/* plain */\n.a {\n  color: #ff0000;\n}\n";
        let out = minify_css(css, Path::new("a.css"), &BrowserTargets::default()).unwrap();
        assert!(out.starts_with("/*! acme widgets (c) */"));
        assert!(out.contains(".a{color:red}"));
        assert!(!out.contains("plain"));
    }

    #[test]
    fn test_resolve_style_path_fallback() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.scss"), "").unwrap();
        std::fs::write(temp_dir.path().join("a.less"), "").unwrap();

        let resolved = resolve_style_path(&temp_dir.path().join("a.css")).unwrap();
        assert_eq!(resolved, temp_dir.path().join("a.scss"));
        assert!(resolve_style_path(&temp_dir.path().join("missing.css")).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = style_syntax(Path::new("theme.styl")).unwrap_err();
        assert!(matches!(err, LibpackError::UnsupportedFormat { ref extension, .. } if extension == "styl"));
        assert_eq!(style_syntax(Path::new("a.SCSS")).unwrap(), Some(StyleSyntax::Scss));
    }

    #[test]
    fn test_inline_urls() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("dot.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(temp_dir.path().join("icon.svg"), "<svg/>").unwrap();
        std::fs::write(temp_dir.path().join("big.png"), vec![0u8; 64]).unwrap();

        let css = ".a{background:url(dot.png)}.b{background:url('icon.svg')}.c{background:url(big.png)}.d{background:url(https://x.test/a.png)}";
        let out = inline_urls(css, temp_dir.path(), 32);
        assert!(out.contains("url(\"data:image/png;base64,iVBORw==\")"));
        assert!(out.contains("data:image/svg+xml;charset=utf-8,%3Csvg%2F%3E"));
        assert!(out.contains("url(big.png)"));
        assert!(out.contains("url(https://x.test/a.png)"));
    }
}
