//! Secret fetch client.
//!
//! [`SecretClient`] is the only way this crate reads secrets from the
//! control plane.  The node agent supplies the real implementation;
//! [`MemorySecretStore`] serves secrets from memory.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{Result, VolumeError};
use crate::types::{Secret, SecretContents};

/// Fetches secret objects by namespace and name.
///
/// Implementations are shared by every volume set up on the node and must
/// tolerate concurrent calls.
#[async_trait]
pub trait SecretClient: Send + Sync {
    /// Fetch the secret `name` in `namespace`.
    ///
    /// Returns [`VolumeError::SecretNotFound`] if it does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
}

/// In-memory secret store, keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: DashMap<(String, String), SecretContents>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` as secret `namespace/name`, replacing any previous value.
    pub fn insert(&self, namespace: &str, name: &str, data: SecretContents) {
        self.secrets
            .insert((namespace.to_owned(), name.to_owned()), data);
    }

    /// Remove secret `namespace/name`, returning its data if it existed.
    pub fn remove(&self, namespace: &str, name: &str) -> Option<SecretContents> {
        self.secrets
            .remove(&(namespace.to_owned(), name.to_owned()))
            .map(|(_, data)| data)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl SecretClient for MemorySecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let key = (namespace.to_owned(), name.to_owned());
        let data = self
            .secrets
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| VolumeError::SecretNotFound {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            })?;
        Ok(Secret {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            data,
        })
    }
}
