//! Small path helpers shared by the stage runners.

use std::path::{Component, Path, PathBuf};

/// Render a path with forward slashes, as package manifests and source maps expect.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::CurDir => None,
            Component::RootDir => Some(String::new()),
            other => Some(other.as_os_str().to_string_lossy().into_owned()),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically normalize `.` and `..` components without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `target` relative to the directory `base`.
///
/// Both paths are normalized lexically first; when they share no prefix the
/// result climbs with `..` as far as needed.
pub fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target = normalize(target);
    let base = normalize(base);

    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();

    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

/// Manifest-style relative path: POSIX separators, no leading `./`.
pub fn manifest_relative(target: &Path, base: &Path) -> String {
    to_posix(&relative_to(target, base))
}

/// Replace the extension of `path`, treating `.d.ts` style double extensions as one.
pub fn with_js_extension(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    for ext in [".d.ts", ".tsx", ".ts", ".mjs", ".js"] {
        if let Some(stem) = text.strip_suffix(ext) {
            return PathBuf::from(format!("{}.js", stem));
        }
    }
    PathBuf::from(format!("{}.js", text))
}

/// File name without the final extension, e.g. `public_api` for `src/public_api.ts`.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
