//! # Index Module
//!
//! The cumulative, deduplicated table of hash rows.
//!
//! ## Layout
//! Columns are fixed per mode: `image_name`, `job_number`, `job_url`, then
//! one `<permutation>_hash` column per permutation of the active
//! [`HashMode`]. Rows are keyed by `image_name`; merging a row for an
//! existing key replaces it.
//!
//! ## Formats
//! - CSV (`csv` crate), missing hash cells are empty strings
//! - Parquet (`arrow` + `parquet`, Snappy), missing hash cells are nulls
//!
//! Both contain identical logical rows and are written atomically.

mod csv;
mod parquet;

use crate::core::durable::write_atomically;
use crate::core::hasher::{HashMode, Permutation};
use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const IMAGE_NAME: &str = "image_name";
pub const JOB_NUMBER: &str = "job_number";
pub const JOB_URL: &str = "job_url";

/// One output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRow {
    /// Object key, the dedup key
    pub image_name: String,
    pub job_number: String,
    pub job_url: String,
    /// Column name -> lowercase hex hash
    pub hashes: BTreeMap<String, String>,
}

/// Column layout for one mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    hash_columns: Vec<String>,
}

impl IndexSchema {
    pub fn for_mode(mode: HashMode) -> Self {
        Self {
            hash_columns: Permutation::for_mode(mode)
                .iter()
                .map(Permutation::column_name)
                .collect(),
        }
    }

    /// Hash columns in output order
    pub fn hash_columns(&self) -> &[String] {
        &self.hash_columns
    }

    /// All columns in output order
    pub fn columns(&self) -> Vec<&str> {
        [IMAGE_NAME, JOB_NUMBER, JOB_URL]
            .into_iter()
            .chain(self.hash_columns.iter().map(String::as_str))
            .collect()
    }

    pub fn is_hash_column(&self, name: &str) -> bool {
        self.hash_columns.iter().any(|c| c == name)
    }
}

/// Physical index format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    #[default]
    Csv,
    Parquet,
}

impl IndexFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            IndexFormat::Csv => "csv",
            IndexFormat::Parquet => "parquet",
        }
    }

    /// The configured path with its extension replaced by this format's
    pub fn output_path(&self, configured: &Path) -> PathBuf {
        configured.with_extension(self.extension())
    }
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for IndexFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(IndexFormat::Csv),
            "parquet" => Ok(IndexFormat::Parquet),
            other => Err(format!("unknown index format '{}' (expected csv or parquet)", other)),
        }
    }
}

/// Outcome of [`HashIndex::merge`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
}

/// Deduplicated rows, sorted by `image_name`
#[derive(Debug, Clone)]
pub struct HashIndex {
    schema: IndexSchema,
    rows: BTreeMap<String, HashRow>,
    /// Header of the file this index was loaded from
    stored_columns: Option<Vec<String>>,
}

impl HashIndex {
    pub fn new(schema: IndexSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            stored_columns: None,
        }
    }

    /// Load `path`, or return an empty index if it does not exist
    pub fn load(path: &Path, format: IndexFormat, schema: IndexSchema) -> Result<Self, IndexError> {
        let mut index = Self::new(schema);
        if !path.exists() {
            return Ok(index);
        }

        let (header, rows) = match format {
            IndexFormat::Csv => csv::read_rows(path, &index.schema)?,
            IndexFormat::Parquet => parquet::read_rows(path, &index.schema)?,
        };
        index.stored_columns = Some(header);
        index.merge(rows);

        Ok(index)
    }

    /// Insert new rows, replacing rows with the same `image_name`
    pub fn merge(&mut self, rows: impl IntoIterator<Item = HashRow>) -> MergeStats {
        let mut stats = MergeStats::default();
        for row in rows {
            match self.rows.insert(row.image_name.clone(), row) {
                Some(_) => stats.replaced += 1,
                None => stats.inserted += 1,
            }
        }
        stats
    }

    pub fn contains(&self, image_name: &str) -> bool {
        self.rows.contains_key(image_name)
    }

    pub fn get(&self, image_name: &str) -> Option<&HashRow> {
        self.rows.get(image_name)
    }

    /// True when the row exists and has every hash column of the schema
    pub fn is_complete(&self, image_name: &str) -> bool {
        self.rows.get(image_name).is_some_and(|row| {
            self.schema
                .hash_columns()
                .iter()
                .all(|c| row.hashes.contains_key(c))
        })
    }

    /// True when the loaded file's header differs from the schema's columns.
    ///
    /// An index that was never loaded from disk has no layout to go stale.
    pub fn layout_changed(&self) -> bool {
        self.stored_columns
            .as_ref()
            .is_some_and(|stored| stored.iter().map(String::as_str).ne(self.schema.columns()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &HashRow> {
        self.rows.values()
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Write the whole index to `path`, replacing it atomically
    pub fn write(&self, path: &Path, format: IndexFormat) -> Result<(), IndexError> {
        write_atomically(path, |file| match format {
            IndexFormat::Csv => csv::write_rows(file, &self.schema, self.rows()),
            IndexFormat::Parquet => parquet::write_rows(file, &self.schema, self.rows()),
        })
        .map_err(|reason| IndexError::Write {
            path: path.to_path_buf(),
            reason,
        })?;

        tracing::info!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }
}

/// Log hash columns that are not part of the active schema
pub(crate) fn warn_dropped_columns<'a>(
    path: &Path,
    schema: &IndexSchema,
    header: impl Iterator<Item = &'a str>,
) {
    let dropped: Vec<&str> = header
        .filter(|name| name.ends_with("_hash") && !schema.is_hash_column(name))
        .collect();

    if !dropped.is_empty() {
        tracing::warn!(
            "Index {} has hash columns outside the active mode, dropping: {}",
            path.display(),
            dropped.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(super) fn row(name: &str, job: &str, url: &str, seed: &str) -> HashRow {
        let hashes = IndexSchema::for_mode(HashMode::Basic)
            .hash_columns()
            .iter()
            .map(|c| (c.clone(), format!("{:0>16}", seed)))
            .collect();
        HashRow {
            image_name: name.to_string(),
            job_number: job.to_string(),
            job_url: url.to_string(),
            hashes,
        }
    }

    #[test]
    fn schema_column_order() {
        let schema = IndexSchema::for_mode(HashMode::Basic);
        assert_eq!(
            schema.columns(),
            vec!["image_name", "job_number", "job_url", "original_hash", "h_flip_hash", "v_flip_hash"]
        );
        assert_eq!(IndexSchema::for_mode(HashMode::Advanced).columns().len(), 13);
    }

    #[test]
    fn merge_replaces_existing_keys() {
        let mut index = HashIndex::new(IndexSchema::for_mode(HashMode::Basic));
        let first = index.merge(vec![row("a", "1", "", "1"), row("b", "1", "", "2")]);
        let second = index.merge(vec![row("a", "1", "", "9"), row("c", "2", "", "3")]);

        assert_eq!(first, MergeStats { inserted: 2, replaced: 0 });
        assert_eq!(second, MergeStats { inserted: 1, replaced: 1 });
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("a").unwrap().hashes["original_hash"], "0000000000000009");
    }

    #[test]
    fn rows_are_sorted_by_name() {
        let mut index = HashIndex::new(IndexSchema::for_mode(HashMode::Basic));
        index.merge(vec![row("c", "1", "", "1"), row("a", "1", "", "1"), row("b", "1", "", "1")]);

        let names: Vec<_> = index.rows().map(|r| r.image_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn output_path_takes_format_suffix() {
        let configured = Path::new("outputs/hash_index.csv");
        assert_eq!(
            IndexFormat::Parquet.output_path(configured),
            PathBuf::from("outputs/hash_index.parquet")
        );
        assert_eq!(
            IndexFormat::Csv.output_path(Path::new("out/index")),
            PathBuf::from("out/index.csv")
        );
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("PARQUET".parse::<IndexFormat>().unwrap(), IndexFormat::Parquet);
        assert!("xlsx".parse::<IndexFormat>().is_err());
    }

    #[test]
    fn missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let index = HashIndex::load(
            &temp_dir.path().join("nope.csv"),
            IndexFormat::Csv,
            IndexSchema::for_mode(HashMode::Basic),
        )
        .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn both_formats_hold_identical_rows() {
        let temp_dir = TempDir::new().unwrap();
        let schema = IndexSchema::for_mode(HashMode::Basic);
        let mut index = HashIndex::new(schema.clone());
        let mut partial = row("jobs/2/c.jpg", "2", "", "3");
        partial.hashes.remove("v_flip_hash");
        index.merge(vec![
            row("jobs/1/a.jpg", "1", "https://example.com/1", "1"),
            row("jobs/1/b.jpg", "1", "https://example.com/1", "2"),
            partial,
        ]);

        for format in [IndexFormat::Csv, IndexFormat::Parquet] {
            let path = format.output_path(&temp_dir.path().join("index"));
            index.write(&path, format).unwrap();

            let loaded = HashIndex::load(&path, format, schema.clone()).unwrap();
            let expected: Vec<_> = index.rows().cloned().collect();
            let actual: Vec<_> = loaded.rows().cloned().collect();
            assert_eq!(actual, expected, "{}", format);
        }
    }

    #[test]
    fn basic_file_loaded_in_advanced_mode_is_incomplete() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.csv");
        let mut basic = HashIndex::new(IndexSchema::for_mode(HashMode::Basic));
        basic.merge(vec![row("a", "1", "", "1")]);
        basic.write(&path, IndexFormat::Csv).unwrap();

        let same = HashIndex::load(&path, IndexFormat::Csv, IndexSchema::for_mode(HashMode::Basic))
            .unwrap();
        assert!(same.is_complete("a"));
        assert!(!same.layout_changed());

        let advanced =
            HashIndex::load(&path, IndexFormat::Csv, IndexSchema::for_mode(HashMode::Advanced))
                .unwrap();
        assert!(advanced.contains("a"));
        assert!(!advanced.is_complete("a"));
        assert!(!advanced.is_complete("missing"));
        assert!(advanced.layout_changed());
    }

    #[test]
    fn write_to_unwritable_location_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let index = HashIndex::new(IndexSchema::for_mode(HashMode::Basic));
        let result = index.write(&blocker.join("index.csv"), IndexFormat::Csv);

        assert!(matches!(result, Err(IndexError::Write { .. })));
    }
}
