//! Readiness marker store.
//!
//! A volume instance is marked ready by a file named [`READY_FILE_NAME`] in
//! its metadata directory.  Only the file's existence matters.  The marker
//! outlives node agent restarts but says nothing about whether the volume is
//! still mounted.

use std::path::Path;

use tokio::fs::{DirBuilder, OpenOptions};
use tracing::debug;

use crate::error::{Result, VolumeError};

/// Name of the marker file inside the metadata directory.
pub const READY_FILE_NAME: &str = "ready";

/// Returns `true` if the marker exists in `meta_dir` and is a regular file.
/// Any error reading it counts as not ready.
pub async fn is_ready(meta_dir: &Path) -> bool {
    let path = meta_dir.join(READY_FILE_NAME);
    match tokio::fs::metadata(&path).await {
        Ok(m) => m.is_file(),
        Err(_) => false,
    }
}

/// Create the marker in `meta_dir`, creating the directory first if needed.
pub async fn set_ready(meta_dir: &Path) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(meta_dir)
        .await
        .map_err(|e| VolumeError::io(meta_dir, e))?;

    let path = meta_dir.join(READY_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .write(true)
        .mode(0o600)
        .open(&path)
        .await
        .map_err(|e| VolumeError::io(&path, e))?;

    debug!(path = %path.display(), "readiness marker set");
    Ok(())
}
