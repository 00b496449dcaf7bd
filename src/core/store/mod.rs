//! # Store Module
//!
//! The object store contract the indexer reads from.
//!
//! Keys are `/`-separated paths. A prefix ending in `/` names a "folder".
//! Every object carries a fingerprint: an opaque revision token assigned by
//! the store. The indexer only ever compares fingerprints for equality.
//!
//! ## Backends
//! - `LocalFsStore` - A directory tree treated as a bucket
//! - `InMemoryStore` - For testing, with fault injection

mod local;
mod memory;

pub use local::LocalFsStore;
pub use memory::InMemoryStore;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Listing entry for one stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key
    pub key: String,
    /// Opaque content revision token
    pub fingerprint: String,
    /// Size in bytes
    pub size: u64,
}

/// Read access to a hierarchical object store
pub trait ObjectStore: Send + Sync {
    /// List the immediate child prefixes of `prefix`, each ending in `/`.
    fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// List every object below `prefix`, at any depth.
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StoreError>;

    /// Open an object for streaming.
    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Read a small object in full.
    ///
    /// Returns `Ok(None)` when the object does not exist.
    fn read_small(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.open(key) {
            Ok(mut reader) => {
                let mut bytes = Vec::new();
                reader
                    .read_to_end(&mut bytes)
                    .map_err(|source| StoreError::Read {
                        key: key.to_string(),
                        source,
                    })?;
                Ok(Some(bytes))
            }
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Normalize a prefix so it is either empty or ends with `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_trailing_slash() {
        assert_eq!(normalize_prefix("images"), "images/");
        assert_eq!(normalize_prefix("images/"), "images/");
    }

    #[test]
    fn normalize_keeps_empty_root() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn normalize_strips_leading_slash() {
        assert_eq!(normalize_prefix("/images/jobs"), "images/jobs/");
    }
}
