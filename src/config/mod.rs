//! Run configuration.
//!
//! Every field has a default, so a JSON config file only needs the values it
//! changes. The CLI layers its flags on top.

use crate::core::enumerator::DEFAULT_EXTENSIONS;
use crate::core::hasher::{HashMode, DEFAULT_RESIZE};
use crate::core::index::IndexFormat;
use crate::core::pipeline::DEFAULT_MAX_OBJECT_BYTES;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings of one indexing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Prefix whose immediate children are jobs
    pub root_prefix: String,
    pub hash_mode: HashMode,
    pub resize_width: u32,
    pub resize_height: u32,
    /// Index path; its extension is replaced by the format's
    pub output_path: PathBuf,
    pub output_format: IndexFormat,
    /// State snapshot path; `.db`/`.sqlite`/`.sqlite3` selects SQLite
    pub state_path: PathBuf,
    pub workers: usize,
    /// Only enumerate the first N jobs
    pub max_jobs: Option<usize>,
    /// Stop submitting work after this many seconds
    pub timeout_secs: Option<u64>,
    pub image_extensions: Vec<String>,
    pub max_object_bytes: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root_prefix: "images/".to_string(),
            hash_mode: HashMode::Basic,
            resize_width: DEFAULT_RESIZE.0,
            resize_height: DEFAULT_RESIZE.1,
            output_path: PathBuf::from("outputs/hash_index.csv"),
            output_format: IndexFormat::Csv,
            state_path: PathBuf::from("outputs/state/seen.json"),
            workers: 16,
            max_jobs: None,
            timeout_secs: None,
            image_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }
}

impl IndexerConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let load_error = |reason: String| ConfigError::Load {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.resize_width == 0 || self.resize_height == 0 {
            return Err(ConfigError::Invalid {
                field: "resize",
                reason: format!(
                    "{}x{} has a zero dimension",
                    self.resize_width, self.resize_height
                ),
            });
        }
        if self.image_extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid {
                field: "image_extensions",
                reason: "at least one extension is required".to_string(),
            });
        }
        if self.max_object_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_object_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "output_path",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Where the index is actually written
    pub fn resolved_output_path(&self) -> PathBuf {
        self.output_format.output_path(&self.output_path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = IndexerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.root_prefix, "images/");
        assert_eq!(config.image_extensions.len(), 5);
        assert_eq!(config.resolved_output_path(), PathBuf::from("outputs/hash_index.csv"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"root_prefix": "jobs/", "hash_mode": "advanced", "output_format": "parquet"}"#,
        )
        .unwrap();

        let config = IndexerConfig::from_json_file(&path).unwrap();

        assert_eq!(config.root_prefix, "jobs/");
        assert_eq!(config.hash_mode, HashMode::Advanced);
        assert_eq!(config.workers, 16);
        assert_eq!(config.resolved_output_path(), PathBuf::from("outputs/hash_index.parquet"));
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ workers: ").unwrap();

        assert!(matches!(
            IndexerConfig::from_json_file(&path),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_workers = IndexerConfig {
            workers: 0,
            ..Default::default()
        };
        let zero_width = IndexerConfig {
            resize_width: 0,
            ..Default::default()
        };
        let no_extensions = IndexerConfig {
            image_extensions: vec![],
            ..Default::default()
        };

        for (config, field) in [
            (zero_workers, "workers"),
            (zero_width, "resize"),
            (no_extensions, "image_extensions"),
        ] {
            match config.validate() {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected Invalid for {}, got {:?}", field, other),
            }
        }
    }
}
