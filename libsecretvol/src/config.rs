//! Node-level configuration for secret volumes.
//!
//! Environment variables:
//! - `RKL_ROOT_DIR`: root directory of the node agent's state.
//!   Defaults to `/var/lib/rkl`. Pod directories live under `<root>/pods`.
//! - `RKL_SECRET_TMPFS_SIZE`: optional `size=` mount option for the tmpfs
//!   backing each secret volume (e.g. `1m`). Unset uses the kernel default.

use std::path::PathBuf;
use std::sync::LazyLock;

/// Default node agent root directory.
pub const DEFAULT_ROOT_DIR: &str = "/var/lib/rkl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Node agent root; pod trees live in `<root_dir>/pods/<pod-uid>`.
    pub root_dir: PathBuf,
    /// Size limit for the tmpfs backing a secret volume.
    pub tmpfs_size: Option<String>,
}

impl NodeConfig {
    /// Configuration rooted at `root_dir` with no tmpfs size limit.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            tmpfs_size: None,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            root_dir: lookup("RKL_ROOT_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR)),
            tmpfs_size: lookup("RKL_SECRET_TMPFS_SIZE").filter(|v| !v.is_empty()),
        }
    }

    /// Directory holding one sub-directory per pod.
    pub fn pods_dir(&self) -> PathBuf {
        self.root_dir.join("pods")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_DIR)
    }
}

/// Globally initialized node configuration, read from environment variables at first access.
pub static NODE_CONFIG: LazyLock<NodeConfig> = LazyLock::new(NodeConfig::from_env);
