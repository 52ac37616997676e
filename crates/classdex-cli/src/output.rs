//! Writing generated files

use anyhow::{Context, Result};
use classdex_core::ContentFingerprint;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// A generated file and whether this run changed it
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub fingerprint: ContentFingerprint,
    pub changed: bool,
}

/// Atomically replace `path` with `content` unless it already holds exactly that.
///
/// The content goes to a temp file in the destination directory first, so
/// readers never observe a partial file.
pub fn write_if_changed(path: &Path, content: &str) -> Result<WrittenFile> {
    let fingerprint = ContentFingerprint::of(content.as_bytes());

    if let Ok(existing) = fs::read(path) {
        if ContentFingerprint::of(&existing).content_matches(&fingerprint) {
            info!(path = %path.display(), hash = %fingerprint.short_hash(), "Unchanged - skipping");
            return Ok(WrittenFile {
                path: path.to_path_buf(),
                fingerprint,
                changed: false,
            });
        }
    }

    let parent = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(content.as_bytes())
        .and_then(|_| temp.flush())
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    info!(path = %path.display(), hash = %fingerprint.short_hash(), "Wrote generated file");
    Ok(WrittenFile {
        path: path.to_path_buf(),
        fingerprint,
        changed: true,
    })
}
