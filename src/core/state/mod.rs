//! # State Module
//!
//! Remembers which objects have already been hashed, keyed by object key,
//! valued by the fingerprint seen at that time.
//!
//! ## Lifecycle
//! 1. `StateStore::open` loads the snapshot once (absent = full rebuild)
//! 2. Workers call `needs_processing` and `record_processed` concurrently;
//!    both only touch the in-memory map
//! 3. `persist` writes the snapshot, and is only called after the index
//!    write succeeded, so the snapshot never runs ahead of the index
//!
//! ## Backends
//! - `JsonSnapshot` - `{"seen": {key: fingerprint}}`
//! - `SqliteSnapshot` - a single `seen` table, for very large stores

mod json;
mod sqlite;

pub use json::JsonSnapshot;
pub use sqlite::SqliteSnapshot;

use crate::error::StateError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persisted form of the key -> fingerprint mapping
pub trait StateSnapshot: Send + Sync {
    /// Read the snapshot. A missing snapshot is an empty mapping.
    fn load(&self) -> Result<HashMap<String, String>, StateError>;

    /// Replace the snapshot with `seen`
    fn save(&self, seen: &HashMap<String, String>) -> Result<(), StateError>;

    /// Where the snapshot lives
    fn path(&self) -> &Path;
}

/// Pick a snapshot backend from the file extension
///
/// `.db`, `.sqlite` and `.sqlite3` use SQLite; anything else is JSON.
pub fn open_snapshot(path: &Path) -> Box<dyn StateSnapshot> {
    let is_sqlite = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "db" | "sqlite" | "sqlite3"))
        .unwrap_or(false);

    if is_sqlite {
        Box::new(SqliteSnapshot::new(path))
    } else {
        Box::new(JsonSnapshot::new(path))
    }
}

/// In-memory change detector backed by a snapshot
pub struct StateStore {
    seen: RwLock<HashMap<String, String>>,
    snapshot: Box<dyn StateSnapshot>,
}

impl StateStore {
    /// Load state from `snapshot`
    pub fn load(snapshot: Box<dyn StateSnapshot>) -> Result<Self, StateError> {
        let seen = snapshot.load()?;
        Ok(Self {
            seen: RwLock::new(seen),
            snapshot,
        })
    }

    /// Load state from `path`, choosing the backend by extension
    pub fn open(path: &Path) -> Result<Self, StateError> {
        Self::load(open_snapshot(path))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        // A panicking writer cannot leave a half-inserted entry behind
        self.seen.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.seen.write().unwrap_or_else(|e| e.into_inner())
    }

    /// True when `key` was never recorded or was recorded with another fingerprint
    pub fn needs_processing(&self, key: &str, fingerprint: &str) -> bool {
        self.read().get(key).map(String::as_str) != Some(fingerprint)
    }

    /// Remember that `key` was hashed at `fingerprint`
    pub fn record_processed(&self, key: &str, fingerprint: &str) {
        self.write().insert(key.to_string(), fingerprint.to_string());
    }

    /// The fingerprint last recorded for `key`
    pub fn fingerprint_of(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    /// Drop every entry for which `keep` returns false.
    ///
    /// Returns the number of entries removed.
    pub fn retain_keys(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let mut seen = self.write();
        let before = seen.len();
        seen.retain(|key, _| keep(key));
        before - seen.len()
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Write the in-memory mapping to the snapshot
    pub fn persist(&self) -> Result<(), StateError> {
        let seen = self.read().clone();
        self.snapshot.save(&seen)
    }

    /// Where the snapshot lives
    pub fn snapshot_path(&self) -> &Path {
        self.snapshot.path()
    }
}
