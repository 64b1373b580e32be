//! Secret volume error types.
//!
//! Every failure in `libsecretvol` is a [`VolumeError`].  The variants keep
//! transient I/O problems, a missing secret client and a missing secret
//! apart, so the node agent can report each one for what it is.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Unified error type for secret volume operations.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// A filesystem operation failed (mount-point check, marker write,
    /// directory creation).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the operation was applied to.
        path: String,
        #[source]
        source: io::Error,
    },

    /// The host has no secret client, so this node cannot reach the
    /// control plane for secrets at all.
    #[error("cannot set up secret volume {volume} because the secret client is not configured")]
    ClientNotConfigured {
        /// Name of the volume being set up.
        volume: String,
    },

    /// The secret does not exist in the control plane.
    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    /// Fetching the secret failed for a reason other than absence.
    #[error("failed to fetch secret {namespace}/{name}: {reason}")]
    SecretFetch {
        namespace: String,
        name: String,
        reason: String,
    },

    /// Writing one secret file failed.  Files written earlier in the same
    /// set-up call are left in place.
    #[error("failed to write secret data to {path}: {source}")]
    WriteFailed {
        /// Host path of the file that could not be written.
        path: String,
        #[source]
        source: io::Error,
    },

    /// A secret key cannot be used as a file name.
    #[error("secret key {key:?} is not a valid file name")]
    InvalidSecretKey { key: String },

    /// The delegate volume could not be mounted.
    #[error("mount failed at {path}: {reason}")]
    MountFailed { path: String, reason: String },

    /// The delegate volume could not be unmounted.
    #[error("unmount failed at {path}: {reason}")]
    UnmountFailed { path: String, reason: String },

    /// The volume spec does not describe a secret volume.
    #[error("unsupported volume: {0}")]
    UnsupportedVolume(String),
}

impl VolumeError {
    /// Create a [`VolumeError::Io`] for `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// `true` when the error means the secret does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SecretNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, VolumeError>;
