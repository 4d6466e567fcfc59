//! Source map re-chaining.
//!
//! Every stage after the compiler consumes generated code, so each emitted map
//! only points one step back. [`compose_file_map`] folds the maps of
//! intermediate files into a map that references the original sources.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use oxc_sourcemap::{SourceMap, SourceMapBuilder};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::errors::{LibpackError, Result};
use crate::paths::{manifest_relative, normalize};

static SOURCE_MAPPING_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(//[#@] sourceMappingURL=).*$").expect("valid regex"));

fn map_error(file: &Path, message: impl Into<String>) -> LibpackError {
    LibpackError::SourceMap {
        file: file.to_path_buf(),
        message: message.into(),
    }
}

fn read_map(path: &Path) -> Result<SourceMap> {
    let content = std::fs::read_to_string(path).map_err(LibpackError::io(path))?;
    SourceMap::from_json_string(&content).map_err(|e| map_error(path, format!("{:?}", e)))
}

/// Sibling map of a file: `<file>.map`.
pub fn map_path_for(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// Re-chain the map at `map_path` through the maps of its sources.
///
/// Sources without a sibling map are kept as they are. Returns whether any
/// source was composed.
pub fn compose_file_map(map_path: &Path) -> Result<bool> {
    let outer = read_map(map_path)?;
    let map_dir = map_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let sources: Vec<String> = outer.get_sources().map(|s| s.to_string()).collect();
    // source id -> (map, lookup table, directory of the intermediate file)
    let mut inners = HashMap::new();
    for (id, source) in sources.iter().enumerate() {
        let source_file = normalize(&map_dir.join(source));
        let inner_path = map_path_for(&source_file);
        if inner_path.is_file() {
            debug!("Composing {} through {}", map_path.display(), inner_path.display());
            let map = read_map(&inner_path)?;
            let lookup = map.generate_lookup_table();
            let dir = source_file.parent().map(Path::to_path_buf).unwrap_or_default();
            inners.insert(id as u32, (map, lookup, dir));
        }
    }
    if inners.is_empty() {
        return Ok(false);
    }

    let mut builder = SourceMapBuilder::default();
    if let Some(file) = outer.get_file() {
        builder.set_file(&file.to_string());
    }
    let mut source_ids: HashMap<String, u32> = HashMap::new();
    let mut name_ids: HashMap<String, u32> = HashMap::new();

    for token in outer.get_tokens() {
        let Some(outer_source) = token.get_source_id() else {
            continue;
        };

        let (source, content, src_line, src_col, name) = match inners.get(&outer_source) {
            Some((inner, lookup, dir)) => {
                let Some(traced) = inner.lookup_token(lookup, token.get_src_line(), token.get_src_col()) else {
                    continue;
                };
                let Some(inner_source) = traced.get_source_id() else {
                    continue;
                };
                let Some(source) = inner.get_source(inner_source) else {
                    continue;
                };
                let absolute = normalize(&dir.join(source.to_string()));
                let name = traced
                    .get_name_id()
                    .and_then(|id| inner.get_name(id))
                    .or_else(|| token.get_name_id().and_then(|id| outer.get_name(id)))
                    .map(|n| n.to_string());
                (
                    manifest_relative(&absolute, &map_dir),
                    inner.get_source_content(inner_source).map(|c| c.to_string()),
                    traced.get_src_line(),
                    traced.get_src_col(),
                    name,
                )
            }
            None => (
                sources[outer_source as usize].clone(),
                outer.get_source_content(outer_source).map(|c| c.to_string()),
                token.get_src_line(),
                token.get_src_col(),
                token.get_name_id().and_then(|id| outer.get_name(id)).map(|n| n.to_string()),
            ),
        };

        let source_id = *source_ids
            .entry(source.clone())
            .or_insert_with(|| builder.add_source_and_content(&source, content.as_deref().unwrap_or_default()));
        let name_id = name.map(|n| *name_ids.entry(n.clone()).or_insert_with(|| builder.add_name(&n)));

        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            src_line,
            src_col,
            Some(source_id),
            name_id,
        );
    }

    let composed = builder.into_sourcemap();
    std::fs::write(map_path, composed.to_json_string()).map_err(LibpackError::io(map_path))?;
    Ok(true)
}

/// Rewrite a map written for a file in `from_dir` so it is valid next to `file` in another directory.
pub fn rebase_map(map_path: &Path, from_dir: &Path, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(map_path).map_err(LibpackError::io(map_path))?;
    let mut raw: Value = serde_json::from_str(&content).map_err(|e| map_error(map_path, e.to_string()))?;
    let to_dir = file.parent().unwrap_or_else(|| Path::new("."));

    let source_root = raw
        .get("sourceRoot")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .map(PathBuf::from);
    let base = match source_root {
        Some(root) => normalize(&from_dir.join(root)),
        None => from_dir.to_path_buf(),
    };

    if let Some(Value::Array(sources)) = raw.get_mut("sources") {
        for source in sources.iter_mut() {
            if let Some(text) = source.as_str() {
                let absolute = normalize(&base.join(text));
                *source = Value::String(manifest_relative(&absolute, to_dir));
            }
        }
    }
    if let Value::Object(map) = &mut raw {
        map.remove("sourceRoot");
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        map.insert("file".to_string(), Value::String(name));
    }

    std::fs::write(map_path, serde_json::to_string(&raw)?).map_err(LibpackError::io(map_path))
}

/// Point the `sourceMappingURL` comment of `code` at `map_name`, appending one when absent.
pub fn set_source_mapping_url(code: &str, map_name: &str) -> String {
    if SOURCE_MAPPING_URL.is_match(code) {
        SOURCE_MAPPING_URL
            .replace_all(code, |caps: &regex::Captures| format!("{}{}", &caps[1], map_name))
            .into_owned()
    } else {
        let mut out = code.trim_end().to_string();
        out.push_str("\n//# sourceMappingURL=");
        out.push_str(map_name);
        out.push('\n');
        out
    }
}

/// Drop the `sourceMappingURL` comment from `code`.
pub fn strip_source_mapping_url(code: &str) -> String {
    SOURCE_MAPPING_URL.replace_all(code, "").trim_end().to_string() + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_map(path: &Path, file: &str, source: &str, content: &str, tokens: &[(u32, u32, u32, u32)]) {
        let mut builder = SourceMapBuilder::default();
        builder.set_file(file);
        let id = builder.add_source_and_content(source, content);
        for &(dl, dc, sl, sc) in tokens {
            builder.add_token(dl, dc, sl, sc, Some(id), None);
        }
        std::fs::write(path, builder.into_sourcemap().to_json_string()).unwrap();
    }

    #[test]
    fn test_compose_through_intermediate_map() {
        let temp_dir = TempDir::new().unwrap();
        let dist = temp_dir.path().join("dist");
        std::fs::create_dir_all(dist.join("esm2015")).unwrap();
        std::fs::create_dir_all(dist.join("bundles")).unwrap();

        // esm2015/index.js <- ../../src/index.ts
        write_map(
            &dist.join("esm2015/index.js.map"),
            "index.js",
            "../../src/index.ts",
            "export const a = 1;",
            &[(0, 0, 0, 0), (0, 13, 0, 13)],
        );
        // bundles/lib.umd.js <- ../esm2015/index.js
        write_map(
            &dist.join("bundles/lib.umd.js.map"),
            "lib.umd.js",
            "../esm2015/index.js",
            "",
            &[(3, 4, 0, 13)],
        );

        assert!(compose_file_map(&dist.join("bundles/lib.umd.js.map")).unwrap());

        let composed = read_map(&dist.join("bundles/lib.umd.js.map")).unwrap();
        let sources: Vec<String> = composed.get_sources().map(|s| s.to_string()).collect();
        assert_eq!(sources, vec!["../../src/index.ts".to_string()]);
        let token = composed.get_tokens().next().unwrap();
        assert_eq!((token.get_dst_line(), token.get_dst_col()), (3, 4));
        assert_eq!((token.get_src_line(), token.get_src_col()), (0, 13));
        assert_eq!(composed.get_source_content(0).map(|c| c.to_string()).as_deref(), Some("export const a = 1;"));
    }

    #[test]
    fn test_compose_without_inner_maps_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let map = temp_dir.path().join("a.js.map");
        write_map(&map, "a.js", "a.ts", "", &[(0, 0, 0, 0)]);
        assert!(!compose_file_map(&map).unwrap());
    }

    #[test]
    fn test_rebase_map() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("dist/bundles/.stage");
        std::fs::create_dir_all(&staging).unwrap();
        let map = staging.join("lib.umd.temp.js.map");
        std::fs::write(&map, r#"{"version":3,"file":"lib.umd.temp.js","sources":["../lib.umd.temp.js"],"names":[],"mappings":"AAAA"}"#).unwrap();

        rebase_map(&map, &staging, &temp_dir.path().join("dist/bundles/lib.umd.js")).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&map).unwrap()).unwrap();
        assert_eq!(raw["sources"][0], "lib.umd.temp.js");
        assert_eq!(raw["file"], "lib.umd.js");
    }

    #[test]
    fn test_source_mapping_url() {
        let code = "var a = 1;\n//# sourceMappingURL=a.temp.js.map";
        assert_eq!(set_source_mapping_url(code, "a.js.map"), "var a = 1;\n//# sourceMappingURL=a.js.map");
        assert_eq!(set_source_mapping_url("var a;", "a.js.map"), "var a;\n//# sourceMappingURL=a.js.map\n");
        assert_eq!(strip_source_mapping_url(code), "var a = 1;\n");
    }
}
