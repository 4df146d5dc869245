//! Remote secret-store access
//!
//! The tree subsystem and the CLI both talk to the remote through the
//! [`SecretStore`] trait. The trait keeps the contract deliberately small:
//! read, list and mount enumeration for exploration, write and delete for the
//! mutating commands.
//!
//! NotFound is data, not an exception: `read` and `list` return `Ok(None)`
//! when the remote has nothing at the path. Node classification depends on
//! this (a path is a directory, a secret, or both, depending on which of the
//! two probes answers), so adapters must map their protocol's "not found"
//! responses to `Ok(None)` rather than to an error.

mod http;

pub use http::{HttpStore, HttpStoreBuilder};

use crate::error::StoreResult;

/// A secret: ordered field→value pairs stored at one remote path
///
/// Field order is the remote's insertion order and is preserved through
/// serialization; values are always strings (adapters serialize non-string
/// JSON values to JSON text).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    fields: Vec<(String, String)>,
}

impl Secret {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping insertion order
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Look up one field by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for Secret {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Mount kinds enumerable on the remote
///
/// The children of the root node are the concatenation of the "kv" mounts
/// followed by the "generic" mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Kv,
    Generic,
}

impl MountKind {
    /// The engine type string the remote reports for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            MountKind::Kv => "kv",
            MountKind::Generic => "generic",
        }
    }
}

/// Operations the client exposes against a remote secret store
///
/// All paths are canonical (see [`crate::path::canonicalize`]); adapters may
/// re-canonicalize defensively but callers are expected to hand in canonical
/// paths. Any failure other than NotFound surfaces as
/// [`crate::error::StoreError`] with the remote's message intact.
pub trait SecretStore: Send + Sync {
    /// Read the secret at `path`. `Ok(None)` means the path holds no secret.
    fn read(&self, path: &str) -> StoreResult<Option<Secret>>;

    /// List the children under `path`. Each child is a relative name; a
    /// trailing `/` marks a sub-namespace, its absence marks a secret.
    /// `Ok(None)` means the path is not a namespace.
    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>>;

    /// Enumerate mount points of the given kind, in the remote's order.
    fn mounts(&self, kind: MountKind) -> StoreResult<Vec<String>>;

    /// Create or replace the secret at `path`.
    fn write(&self, path: &str, secret: &Secret) -> StoreResult<()>;

    /// Delete the secret at `path`. Deleting a missing secret is not an error.
    fn delete(&self, path: &str) -> StoreResult<()>;
}
