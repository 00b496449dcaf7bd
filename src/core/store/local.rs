//! Local directory tree exposed as an object store.

use super::{ObjectStore, ObjectSummary};
use crate::error::StoreError;
use std::fs::{self, File, Metadata};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Object store backed by a local directory
///
/// The directory plays the role of a bucket: an object's key is its path
/// relative to the root, joined with `/`. Fingerprints are weak revision
/// tags built from size and modification time.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn fingerprint(metadata: &Metadata) -> String {
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{:x}-{:x}", metadata.len(), modified)
    }
}

fn list_error(prefix: &str, reason: impl ToString) -> StoreError {
    StoreError::List {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    }
}

impl ObjectStore for LocalFsStore {
    fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self
            .resolve(prefix)
            .ok_or_else(|| list_error(prefix, "prefix escapes the store root"))?;

        let entries = fs::read_dir(&dir).map_err(|e| list_error(prefix, e))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| list_error(prefix, e))?;
            let file_type = entry.file_type().map_err(|e| list_error(prefix, e))?;
            if file_type.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                children.push(format!("{}{}/", prefix, name));
            }
        }
        children.sort();
        Ok(children)
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StoreError> {
        let dir = self
            .resolve(prefix)
            .ok_or_else(|| list_error(prefix, "prefix escapes the store root"))?;

        let mut objects = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| list_error(prefix, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata().map_err(|e| list_error(prefix, e))?;
            let Some(key) = self.key_for(entry.path()) else {
                continue;
            };
            objects.push(ObjectSummary {
                key,
                fingerprint: Self::fingerprint(&metadata),
                size: metadata.len(),
            });
        }
        Ok(objects)
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let path = self.resolve(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;

        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(source) => Err(StoreError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, relative: &str, bytes: &[u8]) {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn lists_job_folders_as_prefixes() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "images/200/a.jpg", b"a");
        write(&temp_dir, "images/100/b.jpg", b"b");
        write(&temp_dir, "images/readme.txt", b"r");

        let store = LocalFsStore::new(temp_dir.path());
        let prefixes = store.list_child_prefixes("images/").unwrap();

        assert_eq!(prefixes, vec!["images/100/", "images/200/"]);
    }

    #[test]
    fn lists_nested_objects_with_slash_keys() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "images/100/sub/b.jpg", b"bb");
        write(&temp_dir, "images/100/a.jpg", b"a");

        let store = LocalFsStore::new(temp_dir.path());
        let objects = store.list_objects("images/100/").unwrap();

        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["images/100/a.jpg", "images/100/sub/b.jpg"]);
        assert_eq!(objects[1].size, 2);
    }

    #[test]
    fn fingerprint_changes_with_content_size() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "j/a.jpg", b"a");
        let store = LocalFsStore::new(temp_dir.path());
        let before = store.list_objects("j/").unwrap()[0].fingerprint.clone();

        write(&temp_dir, "j/a.jpg", b"longer content");
        let after = store.list_objects("j/").unwrap()[0].fingerprint.clone();

        assert_ne!(before, after);
    }

    #[test]
    fn missing_root_is_a_listing_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFsStore::new(temp_dir.path());
        assert!(store.list_child_prefixes("nope/").is_err());
    }

    #[test]
    fn read_small_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFsStore::new(temp_dir.path());
        assert!(store.read_small("j/url.txt").unwrap().is_none());
    }

    #[test]
    fn keys_cannot_escape_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFsStore::new(temp_dir.path());
        assert!(store.open("../etc/passwd").is_err());
    }
}
