//! # libsecretvol — secret-backed volumes for RK8s pods
//!
//! `libsecretvol` materializes a secret as a directory private to one pod:
//! a tmpfs mounted into the pod's volume tree, holding one read-only file
//! per key of the secret.  Nothing is written to stable storage.  It follows
//! the RK8s node library conventions (Tokio async runtime, `tracing` for
//! observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`secret`] | [`SecretPlugin`], set-up and tear-down of secret volumes. |
//! | [`host`] | [`VolumeHost`] trait, per-pod directory layout, [`NodeHost`]. |
//! | [`ready`] | Readiness marker store. |
//! | [`mount`] | [`MountChecker`] trait and `/proc/self/mounts` implementation. |
//! | [`wrapped`] | [`WrappedVolume`] trait and the tmpfs `emptyDir` delegate. |
//! | [`client`] | [`SecretClient`] trait and an in-memory secret store. |
//! | [`config`] | [`NodeConfig`], read from the environment. |
//! | [`types`] | Pod, volume spec and secret data types. |
//! | [`error`] | [`VolumeError`] enum covering all failure modes. |

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod mount;
pub mod ready;
pub mod secret;
pub mod types;
pub mod wrapped;

// Re-export the most commonly used items at crate root for convenience.
pub use client::{MemorySecretStore, SecretClient};
pub use config::{NODE_CONFIG, NodeConfig};
pub use error::{Result, VolumeError};
pub use host::{NodeHost, VolumeHost, VolumePaths, escape_qualified_name};
pub use mount::{MountChecker, ProcMounts};
pub use secret::{SECRET_PLUGIN_NAME, SecretPlugin, SecretVolumeBuilder, SecretVolumeCleaner};
pub use types::*;
pub use wrapped::{TmpfsVolume, WrappedVolume};
