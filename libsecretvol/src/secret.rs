//! The secret volume plugin.
//!
//! A secret volume is a memory-backed directory, private to one pod, holding
//! one read-only file per key of a secret.
//!
//! # Set-up
//!
//! 1. If the mount dir is a mount point and the readiness marker is present,
//!    the volume is already provisioned and nothing else happens.
//! 2. The wrapped memory-backed `emptyDir` is mounted at the mount dir.
//! 3. The secret is fetched from the pod's namespace.
//! 4. Each key is written to `<mount dir>/<key>` with mode `0444`.
//! 5. The readiness marker is set.
//!
//! File writes are not transactional: a failure part-way leaves the files
//! already written in place and the marker unset, so the next set-up call
//! runs every step again.
//!
//! # Tear-down
//!
//! The wrapped volume unmounts and removes the mount dir.  The marker is
//! left for the node agent to remove with the rest of the pod's tree.

use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument};

use crate::error::{Result, VolumeError};
use crate::host::{VolumeHost, VolumePaths};
use crate::mount::MountChecker;
use crate::ready;
use crate::types::*;
use crate::wrapped::WrappedVolume;

/// Qualified name of the secret volume plugin.
pub const SECRET_PLUGIN_NAME: &str = "kubernetes.io/secret";

/// Permission bits of every secret file.
pub const SECRET_FILE_MODE: u32 = 0o444;

/// The volume a secret volume wraps: an in-memory `emptyDir`.
pub fn wrapped_volume_spec() -> VolumeSpec {
    VolumeSpec {
        name: "not-used".to_owned(),
        source: VolumeSource::EmptyDir(EmptyDirVolumeSource {
            medium: StorageMedium::Memory,
        }),
    }
}

/// Entry point used by the node agent to build and clean secret volumes.
pub struct SecretPlugin {
    host: Arc<dyn VolumeHost>,
}

impl SecretPlugin {
    pub fn new(host: Arc<dyn VolumeHost>) -> Self {
        Self { host }
    }

    pub fn name(&self) -> &'static str {
        SECRET_PLUGIN_NAME
    }

    /// `true` if `spec` is a secret volume.
    pub fn can_support(&self, spec: &VolumeSpec) -> bool {
        spec.secret().is_some()
    }

    /// Create a builder that sets up `spec` for `pod`.
    pub fn new_builder(
        &self,
        spec: &VolumeSpec,
        pod: &PodContext,
        mounter: Arc<dyn MountChecker>,
    ) -> Result<SecretVolumeBuilder> {
        let source = spec.secret().ok_or_else(|| {
            VolumeError::UnsupportedVolume(format!("volume {} has no secret source", spec.name))
        })?;

        Ok(SecretVolumeBuilder {
            volume: self.volume(&spec.name, pod.uid.clone(), mounter),
            secret: SecretReference {
                namespace: pod.namespace.clone(),
                secret_name: source.secret_name.clone(),
            },
            pod: pod.clone(),
        })
    }

    /// Create a cleaner that tears down volume `volume_name` of pod `pod_uid`.
    pub fn new_cleaner(
        &self,
        volume_name: &str,
        pod_uid: PodUid,
        mounter: Arc<dyn MountChecker>,
    ) -> SecretVolumeCleaner {
        SecretVolumeCleaner {
            volume: self.volume(volume_name, pod_uid, mounter),
        }
    }

    fn volume(
        &self,
        volume_name: &str,
        pod_uid: PodUid,
        mounter: Arc<dyn MountChecker>,
    ) -> SecretVolume {
        let identity = VolumeIdentity {
            volume_name: volume_name.to_owned(),
            pod_uid,
            plugin_name: SECRET_PLUGIN_NAME,
        };
        let paths = VolumePaths::resolve(self.host.as_ref(), &identity);
        SecretVolume {
            identity,
            paths,
            host: Arc::clone(&self.host),
            mounter,
        }
    }
}

/// State shared by the builder and the cleaner of one volume instance.
struct SecretVolume {
    identity: VolumeIdentity,
    paths: VolumePaths,
    host: Arc<dyn VolumeHost>,
    mounter: Arc<dyn MountChecker>,
}

impl SecretVolume {
    fn wrapped(&self) -> Result<Arc<dyn WrappedVolume>> {
        self.host
            .new_wrapper(&wrapped_volume_spec(), Arc::clone(&self.mounter))
    }
}

/// Populates a secret volume from the control plane.
pub struct SecretVolumeBuilder {
    volume: SecretVolume,
    secret: SecretReference,
    pod: PodContext,
}

impl SecretVolumeBuilder {
    /// Host directory the pod sees.
    pub fn path(&self) -> &Path {
        &self.volume.paths.mount_dir
    }

    /// Host directory holding the readiness marker.
    pub fn meta_dir(&self) -> &Path {
        &self.volume.paths.meta_dir
    }

    pub fn identity(&self) -> &VolumeIdentity {
        &self.volume.identity
    }

    pub fn secret_ref(&self) -> &SecretReference {
        &self.secret
    }

    /// Secret volumes are writable tmpfs directories; the files themselves
    /// are read-only.
    pub fn is_read_only(&self) -> bool {
        false
    }

    /// Set the volume up at its own [`path`](Self::path).
    pub async fn set_up(&self) -> Result<()> {
        let dir = self.path().to_path_buf();
        self.set_up_at(&dir).await
    }

    /// `true` when `mount_dir` is currently a mount point and the readiness
    /// marker in `meta_dir` is present.
    ///
    /// A mount dir that does not exist is simply not provisioned.  Every
    /// other error from the mount check is returned.
    pub async fn is_fully_provisioned(&self, meta_dir: &Path, mount_dir: &Path) -> Result<bool> {
        let mounted = match self.volume.mounter.is_mount_point(mount_dir).await {
            Ok(mounted) => mounted,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(VolumeError::io(mount_dir, e)),
        };
        Ok(mounted && ready::is_ready(meta_dir).await)
    }

    /// Set the volume up at `dir`.  Safe to call repeatedly.
    #[instrument(
        skip(self),
        fields(volume = %self.volume.identity.volume_name, pod = %self.pod.uid)
    )]
    pub async fn set_up_at(&self, dir: &Path) -> Result<()> {
        let meta_dir = self.meta_dir();
        if self.is_fully_provisioned(meta_dir, dir).await? {
            debug!(path = %dir.display(), "volume already set up");
            return Ok(());
        }

        info!(path = %dir.display(), "setting up secret volume");

        self.volume.wrapped()?.set_up_at(dir, &self.pod).await?;

        let client = self
            .volume
            .host
            .secret_client()
            .ok_or_else(|| VolumeError::ClientNotConfigured {
                volume: self.volume.identity.volume_name.clone(),
            })?;

        let secret = client
            .get_secret(&self.secret.namespace, &self.secret.secret_name)
            .await
            .inspect_err(|e| error!(secret = %self.secret, error = %e, "couldn't get secret"))?;

        info!(
            secret = %self.secret,
            keys = secret.data.len(),
            total_bytes = secret.data.total_bytes(),
            "received secret",
        );

        for key in secret.data.keys() {
            validate_key(key)?;
        }

        for (key, data) in &secret.data {
            let host_path = dir.join(key);
            debug!(
                secret = %self.secret,
                key = %key,
                bytes = data.len(),
                path = %host_path.display(),
                "writing secret data",
            );
            write_secret_file(&host_path, data)
                .await
                .inspect_err(|e| error!(error = %e, "error writing secret data to host path"))?;
        }

        ready::set_ready(meta_dir).await?;

        info!(path = %dir.display(), "secret volume set up");
        Ok(())
    }
}

/// Tears a secret volume down.
pub struct SecretVolumeCleaner {
    volume: SecretVolume,
}

impl SecretVolumeCleaner {
    pub fn path(&self) -> &Path {
        &self.volume.paths.mount_dir
    }

    pub fn identity(&self) -> &VolumeIdentity {
        &self.volume.identity
    }

    /// Tear the volume down at its own [`path`](Self::path).
    pub async fn tear_down(&self) -> Result<()> {
        let dir = self.path().to_path_buf();
        self.tear_down_at(&dir).await
    }

    /// Unmount the wrapped volume at `dir`.  Errors from the wrapped volume
    /// are returned as they are.
    #[instrument(
        skip(self),
        fields(volume = %self.volume.identity.volume_name, pod = %self.volume.identity.pod_uid)
    )]
    pub async fn tear_down_at(&self, dir: &Path) -> Result<()> {
        info!(path = %dir.display(), "tearing down secret volume");

        self.volume
            .wrapped()?
            .tear_down_at(dir, &self.volume.identity.pod_uid)
            .await
            .inspect_err(|e| error!(path = %dir.display(), error = %e, "tear down failed"))
    }
}

/// A key must name a single file directly inside the volume.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\0']) {
        return Err(VolumeError::InvalidSecretKey {
            key: key.to_owned(),
        });
    }
    Ok(())
}

/// Write `data` to `path` with [`SECRET_FILE_MODE`], replacing any file a
/// previous attempt left behind.
async fn write_secret_file(path: &Path, data: &[u8]) -> Result<()> {
    let write_failed = |source: io::Error| VolumeError::WriteFailed {
        path: path.display().to_string(),
        source,
    };

    // Files from an earlier attempt are read-only; replace rather than open.
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(write_failed(e)),
    }

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(SECRET_FILE_MODE)
        .open(path)
        .await
        .map_err(write_failed)?;
    file.write_all(data).await.map_err(write_failed)?;
    file.flush().await.map_err(write_failed)?;
    drop(file);

    // The creation mode is filtered by the umask.
    tokio::fs::set_permissions(path, Permissions::from_mode(SECRET_FILE_MODE))
        .await
        .map_err(write_failed)
}
