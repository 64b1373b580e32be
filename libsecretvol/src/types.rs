//! Core types: pod and volume identity, volume specs, and secret contents.
//!
//! Volume specs are [`Serialize`]/[`Deserialize`] with camelCase field names
//! so they can be read straight out of a pod manifest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

// ---------------------------------------------------------------------------
// Pod identity
// ---------------------------------------------------------------------------

/// Opaque, unique identifier for a pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PodUid(pub String);

impl fmt::Display for PodUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PodUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PodUid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The parts of a pod a volume needs to know about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodContext {
    pub uid: PodUid,
    pub namespace: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Volume specs
// ---------------------------------------------------------------------------

/// Backing medium of an `emptyDir` volume.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageMedium {
    /// Node default storage (disk).
    #[default]
    #[serde(rename = "")]
    Default,
    /// tmpfs.
    Memory,
}

/// Source of an `emptyDir` volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmptyDirVolumeSource {
    #[serde(default)]
    pub medium: StorageMedium,
}

/// Source of a secret volume: the secret lives in the pod's namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    pub secret_name: String,
}

/// Where a volume's data comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VolumeSource {
    Secret(SecretVolumeSource),
    EmptyDir(EmptyDirVolumeSource),
}

/// A named volume as it appears in a pod spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeSpec {
    pub name: String,
    #[serde(flatten)]
    pub source: VolumeSource,
}

impl VolumeSpec {
    /// The secret source, if this is a secret volume.
    pub fn secret(&self) -> Option<&SecretVolumeSource> {
        match &self.source {
            VolumeSource::Secret(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Volume instance identity
// ---------------------------------------------------------------------------

/// Identifies one secret volume instance on the node.  Only used to derive
/// host paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeIdentity {
    pub volume_name: String,
    pub pod_uid: PodUid,
    pub plugin_name: &'static str,
}

/// The secret a volume is populated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub namespace: String,
    pub secret_name: String,
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.secret_name)
    }
}

// ---------------------------------------------------------------------------
// Secret data
// ---------------------------------------------------------------------------

/// Key to byte-content mapping of a secret.  Each key becomes one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretContents(BTreeMap<String, Vec<u8>>);

impl SecretContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value of `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of the lengths of all values.
    pub fn total_bytes(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<u8>> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for SecretContents
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a SecretContents {
    type Item = (&'a String, &'a Vec<u8>);
    type IntoIter = btree_map::Iter<'a, String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A secret object as returned by the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub data: SecretContents,
}
