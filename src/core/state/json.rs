//! JSON state snapshot: `{"seen": {"<key>": "<fingerprint>"}}`

use super::StateSnapshot;
use crate::core::durable::write_atomically;
use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    seen: BTreeMap<String, String>,
}

/// State snapshot stored as a single JSON document
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl StateSnapshot for JsonSnapshot {
    fn load(&self) -> Result<HashMap<String, String>, StateError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let file: SnapshotFile =
            serde_json::from_slice(&content).map_err(|_| StateError::Corrupted {
                path: self.path.clone(),
            })?;

        Ok(file.seen.into_iter().collect())
    }

    fn save(&self, seen: &HashMap<String, String>) -> Result<(), StateError> {
        // Sorted keys keep the file byte-identical across unchanged runs
        let file = SnapshotFile {
            seen: seen.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };

        write_atomically(&self.path, |out| {
            serde_json::to_writer_pretty(out, &file).map_err(|e| e.to_string())
        })
        .map_err(|reason| StateError::Write {
            path: self.path.clone(),
            reason,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_state() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = JsonSnapshot::new(&temp_dir.path().join("absent.json"));
        assert!(snapshot.load().unwrap().is_empty());
    }

    #[test]
    fn reads_seen_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.json");
        std::fs::write(&path, r#"{"seen": {"images/1/a.jpg": "\"etag-a\""}}"#).unwrap();

        let seen = JsonSnapshot::new(&path).load().unwrap();

        assert_eq!(seen.get("images/1/a.jpg").map(String::as_str), Some("\"etag-a\""));
    }

    #[test]
    fn garbage_is_reported_as_corrupted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonSnapshot::new(&path).load();

        assert!(matches!(result, Err(StateError::Corrupted { .. })));
    }

    #[test]
    fn save_writes_sorted_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seen.json");
        let snapshot = JsonSnapshot::new(&path);

        let mut seen = HashMap::new();
        seen.insert("b".to_string(), "2".to_string());
        seen.insert("a".to_string(), "1".to_string());
        snapshot.save(&seen).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
        assert_eq!(snapshot.load().unwrap(), seen);
    }
}
