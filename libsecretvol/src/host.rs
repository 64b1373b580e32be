//! Host services a volume plugin depends on.
//!
//! [`VolumeHost`] is the seam between this crate and the node agent: it
//! lays out per-pod directories, hands out the secret client and builds
//! wrapped volumes.  [`NodeHost`] is the implementation rooted at
//! [`NodeConfig::root_dir`].
//!
//! # On-disk layout
//!
//! ```text
//! <root>/pods/<pod-uid>/
//!   volumes/<escaped-plugin>/<volume-name>/   # mount dir, seen by the pod
//!   plugins/<escaped-plugin>/<volume-name>/   # meta dir, holds `ready`
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::client::SecretClient;
use crate::config::NodeConfig;
use crate::error::{Result, VolumeError};
use crate::mount::MountChecker;
use crate::types::{
    EmptyDirVolumeSource, PodUid, StorageMedium, VolumeIdentity, VolumeSource, VolumeSpec,
};
use crate::wrapped::{TmpfsVolume, WrappedVolume};

/// Turn a qualified plugin name such as `kubernetes.io/secret` into a
/// single path component (`kubernetes.io~secret`).
///
/// Qualified names never contain `~`, so distinct names stay distinct.
pub fn escape_qualified_name(name: &str) -> String {
    name.replace('/', "~")
}

/// Host locations of one volume instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePaths {
    /// Where the volume's files become visible to the pod.
    pub mount_dir: PathBuf,
    /// Where the readiness marker lives.
    pub meta_dir: PathBuf,
}

impl VolumePaths {
    pub fn resolve(host: &dyn VolumeHost, identity: &VolumeIdentity) -> Self {
        let plugin = escape_qualified_name(identity.plugin_name);
        Self {
            mount_dir: host.pod_volume_dir(&identity.pod_uid, &plugin, &identity.volume_name),
            meta_dir: host
                .pod_plugin_dir(&identity.pod_uid, &plugin)
                .join(&identity.volume_name),
        }
    }
}

/// Services the node agent provides to volume plugins.
pub trait VolumeHost: Send + Sync {
    /// Directory where volume `volume_name` of plugin `plugin_name` is
    /// mounted for the pod.
    fn pod_volume_dir(&self, pod_uid: &PodUid, plugin_name: &str, volume_name: &str) -> PathBuf;

    /// Directory where plugin `plugin_name` keeps per-pod metadata.
    fn pod_plugin_dir(&self, pod_uid: &PodUid, plugin_name: &str) -> PathBuf;

    /// Client for reading secrets, if this node has one.
    fn secret_client(&self) -> Option<Arc<dyn SecretClient>>;

    /// Build the volume described by `spec` for a plugin to delegate to.
    ///
    /// The wrapper decides whether its directory is mounted with `mounter`,
    /// the same checker the delegating plugin uses.
    fn new_wrapper(
        &self,
        spec: &VolumeSpec,
        mounter: Arc<dyn MountChecker>,
    ) -> Result<Arc<dyn WrappedVolume>>;
}

/// [`VolumeHost`] backed by the local filesystem under a node root.
pub struct NodeHost {
    config: NodeConfig,
    secret_client: Option<Arc<dyn SecretClient>>,
}

impl NodeHost {
    /// A host without a secret client.
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            secret_client: None,
        }
    }

    pub fn with_secret_client(mut self, client: Arc<dyn SecretClient>) -> Self {
        self.secret_client = Some(client);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn pod_dir(&self, pod_uid: &PodUid) -> PathBuf {
        self.config.pods_dir().join(&pod_uid.0)
    }
}

impl VolumeHost for NodeHost {
    fn pod_volume_dir(&self, pod_uid: &PodUid, plugin_name: &str, volume_name: &str) -> PathBuf {
        self.pod_dir(pod_uid)
            .join("volumes")
            .join(plugin_name)
            .join(volume_name)
    }

    fn pod_plugin_dir(&self, pod_uid: &PodUid, plugin_name: &str) -> PathBuf {
        self.pod_dir(pod_uid).join("plugins").join(plugin_name)
    }

    fn secret_client(&self) -> Option<Arc<dyn SecretClient>> {
        self.secret_client.clone()
    }

    fn new_wrapper(
        &self,
        spec: &VolumeSpec,
        mounter: Arc<dyn MountChecker>,
    ) -> Result<Arc<dyn WrappedVolume>> {
        match &spec.source {
            VolumeSource::EmptyDir(EmptyDirVolumeSource {
                medium: StorageMedium::Memory,
            }) => Ok(Arc::new(TmpfsVolume::new(
                mounter,
                self.config.tmpfs_size.clone(),
            ))),
            other => Err(VolumeError::UnsupportedVolume(format!(
                "no wrapper for volume {} ({other:?})",
                spec.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemorySecretStore;
    use crate::mount::ProcMounts;
    use crate::types::{PodContext, SecretVolumeSource};

    fn host() -> NodeHost {
        NodeHost::new(NodeConfig::new("/var/lib/rkl"))
    }

    #[test]
    fn escape_replaces_slashes() {
        assert_eq!(
            escape_qualified_name("kubernetes.io/secret"),
            "kubernetes.io~secret"
        );
        assert_eq!(escape_qualified_name("plain"), "plain");
    }

    #[test]
    fn escaped_names_do_not_collide() {
        assert_ne!(
            escape_qualified_name("a.io/b"),
            escape_qualified_name("a.io-b")
        );
    }

    #[test]
    fn pod_volume_dir_layout() {
        let dir = host().pod_volume_dir(&PodUid::from("uid-1"), "kubernetes.io~secret", "creds");
        assert_eq!(
            dir,
            PathBuf::from("/var/lib/rkl/pods/uid-1/volumes/kubernetes.io~secret/creds")
        );
    }

    #[test]
    fn pod_plugin_dir_layout() {
        let dir = host().pod_plugin_dir(&PodUid::from("uid-1"), "kubernetes.io~secret");
        assert_eq!(
            dir,
            PathBuf::from("/var/lib/rkl/pods/uid-1/plugins/kubernetes.io~secret")
        );
    }

    #[test]
    fn resolve_volume_paths() {
        let identity = VolumeIdentity {
            volume_name: "creds".into(),
            pod_uid: PodUid::from("uid-1"),
            plugin_name: "kubernetes.io/secret",
        };
        let paths = VolumePaths::resolve(&host(), &identity);
        assert_eq!(
            paths.mount_dir,
            PathBuf::from("/var/lib/rkl/pods/uid-1/volumes/kubernetes.io~secret/creds")
        );
        assert_eq!(
            paths.meta_dir,
            PathBuf::from("/var/lib/rkl/pods/uid-1/plugins/kubernetes.io~secret/creds")
        );
    }

    #[test]
    fn secret_client_is_optional() {
        assert!(host().secret_client().is_none());
        let host = host().with_secret_client(Arc::new(MemorySecretStore::new()));
        assert!(host.secret_client().is_some());
    }

    #[test]
    fn wrapper_only_for_memory_empty_dir() {
        let memory = VolumeSpec {
            name: "not-used".into(),
            source: VolumeSource::EmptyDir(EmptyDirVolumeSource {
                medium: StorageMedium::Memory,
            }),
        };
        assert!(host().new_wrapper(&memory, Arc::new(ProcMounts)).is_ok());

        let secret = VolumeSpec {
            name: "creds".into(),
            source: VolumeSource::Secret(SecretVolumeSource {
                secret_name: "db".into(),
            }),
        };
        assert!(matches!(
            host().new_wrapper(&secret, Arc::new(ProcMounts)),
            Err(VolumeError::UnsupportedVolume(_))
        ));
    }

    struct AlwaysMounted;

    #[async_trait::async_trait]
    impl MountChecker for AlwaysMounted {
        async fn is_mount_point(&self, _path: &std::path::Path) -> std::io::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn wrapper_checks_mounts_with_given_mounter() {
        let tmp = tempfile::tempdir().unwrap();
        let memory = crate::secret::wrapped_volume_spec();
        let wrapper = host()
            .new_wrapper(&memory, Arc::new(AlwaysMounted))
            .unwrap();

        let pod = PodContext {
            uid: PodUid::from("uid-1"),
            namespace: "default".into(),
            name: "web".into(),
        };
        // Reported as mounted, so no tmpfs is mounted and no error surfaces.
        wrapper.set_up_at(tmp.path(), &pod).await.unwrap();
    }
}
