//! Script-target transformation of a single bundled file.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{LibpackError, Result};
use crate::sourcemap::{compose_file_map, map_path_for, rebase_map, set_source_mapping_url};
use crate::toolchain::{Toolchain, TransformJob};

/// Staging name for a bundle that still needs a tier transform: `<stem>.temp.js`.
pub fn staging_path(output: &Path) -> PathBuf {
    let stem = crate::paths::file_stem(output);
    output.with_file_name(format!("{}.temp.js", stem))
}

/// Transform `job.source` into `job.destination`, re-chain its map and remove
/// the `.temp.*` staging files.
pub async fn transform_script_target<T: Toolchain>(toolchain: &T, job: &TransformJob) -> Result<()> {
    info!(
        "Transforming {} to {}",
        job.source.display(),
        job.target
    );
    toolchain.transform(job).await?;

    if job.source_map {
        let map_path = map_path_for(&job.destination);
        if map_path.is_file() {
            compose_file_map(&map_path)?;
        }
    }

    remove_staging_files(&job.source).await;
    Ok(())
}

/// Move a file the compiler emitted into a scratch directory to `destination`,
/// fixing its `sourceMappingURL` and map on the way.
pub async fn adopt_emitted_file(emitted: &Path, destination: &Path, source_map: bool) -> Result<()> {
    let code = tokio::fs::read_to_string(emitted)
        .await
        .map_err(LibpackError::io(emitted))?;

    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LibpackError::internal(format!("destination has no file name: {}", destination.display())))?;

    let emitted_map = map_path_for(emitted);
    let code = if source_map && emitted_map.is_file() {
        let destination_map = map_path_for(destination);
        let from_dir = emitted.parent().unwrap_or_else(|| Path::new("."));
        rebase_map(&emitted_map, from_dir, destination)?;
        tokio::fs::copy(&emitted_map, &destination_map)
            .await
            .map_err(LibpackError::io(&destination_map))?;
        set_source_mapping_url(&code, &format!("{}.map", file_name))
    } else {
        crate::sourcemap::strip_source_mapping_url(&code)
    };

    tokio::fs::write(destination, code)
        .await
        .map_err(LibpackError::io(destination))?;
    debug!("Moved {} to {}", emitted.display(), destination.display());
    Ok(())
}

/// Delete `<stem>.temp.js` and its map. Other files are left alone.
pub async fn remove_staging_files(source: &Path) {
    let is_staging = source
        .file_name()
        .map(|n| n.to_string_lossy().contains(".temp."))
        .unwrap_or(false);
    if !is_staging {
        return;
    }
    for path in [source.to_path_buf(), map_path_for(source)] {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/p/dist/bundles/lib.umd.js")),
            PathBuf::from("/p/dist/bundles/lib.umd.temp.js")
        );
    }

    #[tokio::test]
    async fn test_adopt_emitted_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest_dir = temp_dir.path().join("bundles");
        let scratch = dest_dir.join(".scratch");
        std::fs::create_dir_all(&scratch).unwrap();

        let emitted = scratch.join("lib.umd.temp.js");
        std::fs::write(&emitted, "var a = 1;\n//# sourceMappingURL=lib.umd.temp.js.map").unwrap();
        std::fs::write(
            scratch.join("lib.umd.temp.js.map"),
            r#"{"version":3,"file":"lib.umd.temp.js","sources":["../lib.umd.temp.js"],"names":[],"mappings":"AAAA"}"#,
        )
        .unwrap();

        let destination = dest_dir.join("lib.umd.js");
        adopt_emitted_file(&emitted, &destination, true).await.unwrap();

        let code = std::fs::read_to_string(&destination).unwrap();
        assert!(code.ends_with("//# sourceMappingURL=lib.umd.js.map"));
        let map: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dest_dir.join("lib.umd.js.map")).unwrap()).unwrap();
        assert_eq!(map["sources"][0], "lib.umd.temp.js");
        assert_eq!(map["file"], "lib.umd.js");
    }

    #[tokio::test]
    async fn test_remove_staging_files_only_touches_temp() {
        let temp_dir = TempDir::new().unwrap();
        let staged = temp_dir.path().join("a.temp.js");
        let kept = temp_dir.path().join("a.js");
        std::fs::write(&staged, "").unwrap();
        std::fs::write(temp_dir.path().join("a.temp.js.map"), "{}").unwrap();
        std::fs::write(&kept, "").unwrap();

        remove_staging_files(&staged).await;
        remove_staging_files(&kept).await;

        assert!(!staged.exists());
        assert!(!temp_dir.path().join("a.temp.js.map").exists());
        assert!(kept.exists());
    }
}
