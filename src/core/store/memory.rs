//! In-memory object store for testing.

use super::{ObjectStore, ObjectSummary};
use crate::error::StoreError;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    fingerprint: String,
}

/// Map-backed object store
///
/// Keys are kept sorted so listings are deterministic. Reads and listings
/// can be made to fail on purpose to exercise error handling.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_reads: RwLock<HashSet<String>>,
    failing_listings: RwLock<HashSet<String>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an object with an explicit fingerprint
    pub fn put(&self, key: &str, bytes: Vec<u8>, fingerprint: &str) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    fingerprint: fingerprint.to_string(),
                },
            );
        }
    }

    /// Make every read of `key` fail with an I/O error
    pub fn fail_reads_of(&self, key: &str) {
        if let Ok(mut failing) = self.failing_reads.write() {
            failing.insert(key.to_string());
        }
    }

    /// Make listing `prefix` fail
    pub fn fail_listing_of(&self, prefix: &str) {
        if let Ok(mut failing) = self.failing_listings.write() {
            failing.insert(prefix.to_string());
        }
    }

    fn check_listing(&self, prefix: &str) -> Result<(), StoreError> {
        let failing = self.failing_listings.read().map_err(|_| poisoned(prefix))?;
        if failing.contains(prefix) {
            return Err(StoreError::List {
                prefix: prefix.to_string(),
                reason: "access denied".to_string(),
            });
        }
        Ok(())
    }
}

fn poisoned(prefix: &str) -> StoreError {
    StoreError::List {
        prefix: prefix.to_string(),
        reason: "store lock poisoned".to_string(),
    }
}

impl ObjectStore for InMemoryStore {
    fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_listing(prefix)?;
        let objects = self.objects.read().map_err(|_| poisoned(prefix))?;

        let mut children: Vec<String> = Vec::new();
        for key in objects.keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(slash) = rest.find('/') {
                children.push(format!("{}{}", prefix, &rest[..=slash]));
            }
        }
        // Keys sharing a prefix are contiguous in a sorted map
        children.dedup();
        Ok(children)
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StoreError> {
        self.check_listing(prefix)?;
        let objects = self.objects.read().map_err(|_| poisoned(prefix))?;

        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                fingerprint: object.fingerprint.clone(),
                size: object.bytes.len() as u64,
            })
            .collect())
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let failing = self.failing_reads.read().map_err(|_| poisoned(key))?;
        if failing.contains(key) {
            return Err(StoreError::Read {
                key: key.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ),
            });
        }
        drop(failing);

        let objects = self.objects.read().map_err(|_| poisoned(key))?;
        match objects.get(key) {
            Some(object) => Ok(Box::new(Cursor::new(object.bytes.clone()))),
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}
