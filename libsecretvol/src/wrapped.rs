//! Delegate (wrapped) volumes.
//!
//! A secret volume never mounts anything itself.  It asks the host for a
//! [`WrappedVolume`] built from a fixed memory-backed `emptyDir` spec and
//! lets that volume do the mount and unmount work.  [`TmpfsVolume`] is the
//! node's implementation of that spec.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::DirBuilder;
use tracing::{debug, info, instrument};

use crate::error::{Result, VolumeError};
use crate::mount::MountChecker;
use crate::types::{PodContext, PodUid};

/// A volume that can be mounted at and unmounted from a host directory.
#[async_trait]
pub trait WrappedVolume: Send + Sync {
    /// Mount an empty volume at `dir`, creating the directory if needed.
    ///
    /// Must succeed without remounting when `dir` is already mounted.
    async fn set_up_at(&self, dir: &Path, pod: &PodContext) -> Result<()>;

    /// Unmount the volume at `dir` and remove the directory.
    ///
    /// Must succeed when `dir` does not exist or is not mounted.
    async fn tear_down_at(&self, dir: &Path, pod_uid: &PodUid) -> Result<()>;
}

/// Memory-backed `emptyDir`: a tmpfs mounted at the volume directory.
pub struct TmpfsVolume {
    mounter: Arc<dyn MountChecker>,
    /// Value of the tmpfs `size=` option.
    size: Option<String>,
}

impl TmpfsVolume {
    pub fn new(mounter: Arc<dyn MountChecker>, size: Option<String>) -> Self {
        Self { mounter, size }
    }

    /// `Ok(None)` when `dir` does not exist, otherwise whether it is mounted.
    async fn mount_state(&self, dir: &Path) -> Result<Option<bool>> {
        match self.mounter.is_mount_point(dir).await {
            Ok(mounted) => Ok(Some(mounted)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VolumeError::io(dir, e)),
        }
    }
}

#[async_trait]
impl WrappedVolume for TmpfsVolume {
    #[instrument(skip(self, pod), fields(pod = %pod.uid))]
    async fn set_up_at(&self, dir: &Path, pod: &PodContext) -> Result<()> {
        if self.mount_state(dir).await? == Some(true) {
            debug!(path = %dir.display(), "tmpfs already mounted");
            return Ok(());
        }

        DirBuilder::new()
            .recursive(true)
            .mode(0o750)
            .create(dir)
            .await
            .map_err(|e| VolumeError::MountFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let options = self.size.as_ref().map(|size| format!("size={size}"));
        nix::mount::mount(
            Some("tmpfs"),
            dir,
            Some("tmpfs"),
            nix::mount::MsFlags::empty(),
            options.as_deref(),
        )
        .map_err(|e| VolumeError::MountFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        info!(path = %dir.display(), "tmpfs mounted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn tear_down_at(&self, dir: &Path, pod_uid: &PodUid) -> Result<()> {
        let Some(mounted) = self.mount_state(dir).await? else {
            debug!(path = %dir.display(), "volume dir gone, nothing to tear down");
            return Ok(());
        };

        if mounted {
            nix::mount::umount(dir).map_err(|e| VolumeError::UnmountFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|e| VolumeError::UnmountFailed {
                path: dir.display().to_string(),
                reason: format!("remove volume dir: {e}"),
            })?;

        info!(path = %dir.display(), was_mounted = mounted, "tmpfs torn down");
        Ok(())
    }
}
