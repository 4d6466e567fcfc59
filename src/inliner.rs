//! Replaces external component resources in compiled output with inline text.
//!
//! Compiled scripts reference templates and styles by URL relative to the
//! *source* file they came from. The compiled tree mirrors the source tree, so a
//! script at `<out>/lib/card.js` resolves `./card.html` against
//! `<source root>/lib/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::edits::SourceEdits;
use crate::errors::{LibpackError, Result};
use crate::html::minify_html;
use crate::literal::{parse_string_list, quote};
use crate::metadata::{self, ResourceKind};
use crate::styles::StyleProcessor;
use crate::toolchain::Toolchain;

pub const DEFAULT_SCRIPT_PATTERN: &str = "**/*.js";

static TEMPLATE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\btemplateUrl\s*:"#).expect("valid regex"));
static STYLE_URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bstyleUrls\s*:"#).expect("valid regex"));
static MODULE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bmoduleId\s*:\s*module\.id\s*,?\s*"#).expect("valid regex"));

/// Resource text keyed by normalized absolute source path, for one inlining run.
#[derive(Debug, Default)]
pub struct ComponentResourceMap {
    entries: HashMap<PathBuf, String>,
}

impl ComponentResourceMap {
    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries.get(&crate::paths::normalize(path)).map(String::as_str)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(&crate::paths::normalize(path))
    }

    pub fn insert(&mut self, path: &Path, text: String) {
        self.entries.insert(crate::paths::normalize(path), text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineOutcome {
    /// At least one reference was replaced.
    pub replaced: bool,
    pub files_changed: usize,
}

/// Where to look and how to map compiled files back to their sources.
#[derive(Debug, Clone)]
pub struct InlineRequest<'a> {
    /// Compiled output directory to scan.
    pub search_root: &'a Path,
    pub pattern: &'a str,
    /// Directory the compiled tree mirrors.
    pub source_root: &'a Path,
    /// Rewrite `.metadata.json` companions too.
    pub metadata: bool,
}

struct PendingEdit {
    start: usize,
    end: usize,
    kind: ResourceKind,
    urls: Vec<String>,
}

pub struct ResourceInliner<'a, T: Toolchain> {
    styles: StyleProcessor<'a, T>,
    resources: ComponentResourceMap,
}

impl<'a, T: Toolchain> ResourceInliner<'a, T> {
    pub fn new(styles: StyleProcessor<'a, T>) -> Self {
        Self {
            styles,
            resources: ComponentResourceMap::default(),
        }
    }

    pub async fn run(mut self, request: &InlineRequest<'_>) -> Result<InlineOutcome> {
        let pattern = glob::Pattern::new(request.pattern)
            .map_err(|e| LibpackError::invalid_config(format!("invalid file pattern '{}': {}", request.pattern, e)))?;

        let mut outcome = InlineOutcome::default();
        for path in matching_files(request.search_root, |rel| pattern.matches_path(rel))? {
            if self.inline_script(&path, request).await? {
                outcome.replaced = true;
                outcome.files_changed += 1;
            }
        }

        if request.metadata {
            let metadata_files =
                matching_files(request.search_root, |rel| rel.to_string_lossy().ends_with(".metadata.json"))?;
            for path in metadata_files {
                if self.inline_metadata_file(&path, request).await? {
                    outcome.replaced = true;
                    outcome.files_changed += 1;
                }
            }
        }

        info!(
            "Inlined {} resource(s) into {} file(s)",
            self.resources.len(),
            outcome.files_changed
        );
        Ok(outcome)
    }

    async fn inline_script(&mut self, path: &Path, request: &InlineRequest<'_>) -> Result<bool> {
        let source = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
        if !source.contains("templateUrl") && !source.contains("styleUrls") && !source.contains("moduleId") {
            return Ok(false);
        }

        let mut pending = Vec::new();
        for (regex, kind) in [(&*TEMPLATE_URL, ResourceKind::Template), (&*STYLE_URLS, ResourceKind::Style)] {
            for found in regex.find_iter(&source) {
                match parse_string_list(&source, found.end()) {
                    Ok(list) if kind == ResourceKind::Template && list.values.len() != 1 => {
                        warn!("{}: templateUrl must be a single string, left as is", path.display());
                    }
                    Ok(list) => pending.push(PendingEdit {
                        start: found.start(),
                        end: list.end,
                        kind,
                        urls: list.values,
                    }),
                    Err(e) => warn!("{}: reference is not a literal ({}), left as is", path.display(), e),
                }
            }
        }

        let base = source_dir_for(path, request);
        let mut edits = SourceEdits::new();
        for edit in &pending {
            let mut texts = Vec::with_capacity(edit.urls.len());
            for url in &edit.urls {
                let resolved = base.join(url);
                texts.push(quote(self.load(&resolved, edit.kind).await?));
            }
            let replacement = match edit.kind {
                ResourceKind::Template => format!("template: {}", texts.join("")),
                ResourceKind::Style => format!("styles: [{}]", texts.join(", ")),
            };
            edits.replace(edit.start, edit.end, replacement);
        }
        for found in MODULE_ID.find_iter(&source) {
            edits.replace(found.start(), found.end(), "");
        }

        if edits.is_empty() {
            return Ok(false);
        }
        debug!("Rewriting {} ({} edit(s))", path.display(), edits.len());
        let rewritten = edits.apply(&source)?;
        std::fs::write(path, rewritten).map_err(LibpackError::io(path))?;
        Ok(true)
    }

    async fn inline_metadata_file(&mut self, path: &Path, request: &InlineRequest<'_>) -> Result<bool> {
        let content = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
        let mut doc: serde_json::Value = serde_json::from_str(&content).map_err(|e| LibpackError::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;

        let base = source_dir_for(path, request);
        for reference in metadata::collect_resources(&doc) {
            let resolved = base.join(&reference.base).join(&reference.url);
            self.load(&resolved, reference.kind).await?;
        }

        let resources = &self.resources;
        let changed = metadata::inline_metadata(&mut doc, |reference| {
            let resolved = base.join(&reference.base).join(&reference.url);
            resources
                .get(&resolved)
                .map(str::to_string)
                .ok_or_else(|| LibpackError::internal(format!("resource not loaded: {}", resolved.display())))
        })?;

        if changed {
            debug!("Rewriting metadata {}", path.display());
            let out = serde_json::to_string(&doc)?;
            std::fs::write(path, out).map_err(LibpackError::io(path))?;
        }
        Ok(changed)
    }

    /// Resource text, loading it into the map on first use.
    async fn load(&mut self, path: &Path, kind: ResourceKind) -> Result<&str> {
        let key = crate::paths::normalize(path);
        if !self.resources.contains(&key) {
            let text = match kind {
                ResourceKind::Template => {
                    let raw = std::fs::read_to_string(&key).map_err(LibpackError::io(&key))?;
                    minify_html(&raw)
                }
                ResourceKind::Style => self.styles.process(&key).await?,
            };
            self.resources.insert(&key, text);
        }
        self.resources
            .get(&key)
            .ok_or_else(|| LibpackError::internal(format!("resource not loaded: {}", key.display())))
    }
}

/// Source directory a compiled file's relative URLs resolve against.
fn source_dir_for(compiled: &Path, request: &InlineRequest<'_>) -> PathBuf {
    let rel_dir = compiled
        .parent()
        .and_then(|dir| dir.strip_prefix(request.search_root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    request.source_root.join(rel_dir)
}

fn matching_files(root: &Path, matches: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("file system loop"));
            LibpackError::io(path)(source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matches(rel) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
