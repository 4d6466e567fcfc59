//! Placeholder substitution for configured output paths, file names and banners.
//!
//! Supported tokens (case-insensitive, the hyphen is optional):
//!
//! - `[package-scope]`: npm scope without the leading `@`
//! - `[parent-package-name]`: for secondary entry points such as `@scope/lib/testing`
//! - `[package-name]`: the unscoped package name
//! - `[name]`: the entry file's base name, applied last and only when known
//!
//! A token whose value is unknown is replaced with an empty string.

use std::sync::LazyLock;

use regex::Regex;

static PACKAGE_SCOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[package-?scope\]").expect("valid regex"));
static PARENT_PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[parent-?package-?name\]").expect("valid regex"));
static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[package-?name\]").expect("valid regex"));
static ENTRY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[name\]").expect("valid regex"));
static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[(?:package-?)?version\]").expect("valid regex"));
static CURRENT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[current-?year\]").expect("valid regex"));
static DOUBLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^:/])//+").expect("valid regex"));

/// Identity fields of the package being built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectIdentity {
    /// Scope without `@`, e.g. `acme` for `@acme/widgets`.
    pub package_scope: Option<String>,
    pub parent_package_name: Option<String>,
    /// Last segment of the package name, e.g. `widgets`.
    pub package_name: String,
    /// The package name as written in the manifest.
    pub full_name: String,
}

impl ProjectIdentity {
    /// Split an npm package name: `@acme/widgets/testing` has scope `acme`,
    /// parent `widgets` and name `testing`.
    pub fn from_package_name(name: &str) -> Self {
        let name = name.trim();
        let (scope, rest) = match name.strip_prefix('@') {
            Some(scoped) => match scoped.split_once('/') {
                Some((scope, rest)) => (Some(scope.to_string()), rest),
                None => (None, scoped),
            },
            None => (None, name),
        };

        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let package_name = segments.last().copied().unwrap_or_default().to_string();
        let parent_package_name = if segments.len() > 1 {
            Some(segments[segments.len() - 2].to_string())
        } else {
            None
        };

        Self {
            package_scope: scope,
            parent_package_name,
            package_name,
            full_name: name.to_string(),
        }
    }

    /// camelCase global name used for UMD/IIFE bundles when none is configured.
    pub fn global_name(&self) -> String {
        let mut out = String::new();
        let mut upper_next = false;
        for ch in self.package_name.chars() {
            if ch == '-' || ch == '_' || ch == '.' {
                upper_next = !out.is_empty();
            } else if upper_next {
                out.extend(ch.to_uppercase());
                upper_next = false;
            } else {
                out.push(ch);
            }
        }
        match &self.package_scope {
            Some(scope) => format!("{}.{}", scope.replace('-', "_"), out),
            None => out,
        }
    }
}

/// Replace package tokens in `input`; `[name]` becomes `entry_name` when one is given.
pub fn resolve_tokens(input: &str, identity: &ProjectIdentity, entry_name: Option<&str>) -> String {
    let scope = identity.package_scope.as_deref().unwrap_or_default();
    let parent = identity.parent_package_name.as_deref().unwrap_or_default();

    let mut out = PARENT_PACKAGE_NAME
        .replace_all(input, regex::NoExpand(parent))
        .into_owned();
    out = PACKAGE_SCOPE
        .replace_all(&out, regex::NoExpand(scope))
        .into_owned();
    out = PACKAGE_NAME
        .replace_all(&out, regex::NoExpand(&identity.package_name))
        .into_owned();

    if out != input {
        out = DOUBLE_SEPARATOR.replace_all(&out, "$1/").into_owned();
        // an empty leading token must not turn a relative path into an absolute one
        if !input.starts_with('/') && out.starts_with('/') {
            out = out.trim_start_matches('/').to_string();
        }
    }

    if let Some(entry_name) = entry_name {
        out = ENTRY_NAME
            .replace_all(&out, regex::NoExpand(entry_name))
            .into_owned();
    }

    out
}

/// Resolve a banner: package tokens plus `[version]` and `[current-year]`.
pub fn resolve_banner(input: &str, identity: &ProjectIdentity, version: &str) -> String {
    let year = chrono::Local::now().format("%Y").to_string();
    let out = resolve_tokens(input, identity, None);
    let out = VERSION.replace_all(&out, regex::NoExpand(version));
    CURRENT_YEAR
        .replace_all(&out, regex::NoExpand(&year))
        .into_owned()
}
