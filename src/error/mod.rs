//! # Error Module
//!
//! Error types for the hash indexer.
//!
//! ## Design Principles
//! - **Never panic** on store content - return errors instead
//! - **Include context** - object keys, file paths, what went wrong
//! - **Name the phase** - a fatal error says whether enumeration, state,
//!   index or configuration failed
//! - **Per-object errors stay local** - `StoreError` and `HashError` for a
//!   single object are reported, never escalated to `IndexerError`

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by a run. Every variant is fatal.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Enumeration failed: {0}")]
    Enumerate(#[from] EnumerateError),

    #[error("Hasher setup failed: {0}")]
    Hash(#[from] HashError),

    #[error("State store failed: {0}")]
    State(#[from] StateError),

    #[error("Index I/O failed: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by an object store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Failed to list {prefix}: {reason}")]
    List { prefix: String, reason: String },

    #[error("Failed to read object {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object {key} is {size} bytes, above the {limit} byte limit")]
    TooLarge { key: String, size: u64, limit: u64 },
}

/// Errors that stop enumeration before any hashing
#[derive(Error, Debug)]
pub enum EnumerateError {
    #[error("Cannot list root prefix '{prefix}': {source}")]
    RootListing {
        prefix: String,
        #[source]
        source: StoreError,
    },
}

/// Errors that occur during image hashing
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unreadable image content in {key}: {reason}")]
    Unreadable { key: String, reason: String },

    #[error("Invalid resize dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),
}

impl HashError {
    /// Attach an object key to an error raised before the key was known.
    pub fn with_key(self, key: &str) -> Self {
        match self {
            HashError::Unreadable { reason, .. } => HashError::Unreadable {
                key: key.to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Errors reading or writing the state snapshot
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state snapshot {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write state snapshot {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("State snapshot {path} is corrupted. Delete it to force a full rebuild.")]
    Corrupted { path: PathBuf },
}

/// Errors reading or writing the index file
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read index {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write index {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Index {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
}

/// Invalid configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, IndexerError>;
