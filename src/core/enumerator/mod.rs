//! # Enumerator Module
//!
//! Discovers image objects under a root prefix, grouped into jobs.
//!
//! ## Layout
//! ```text
//! <root>/<job_number>/url.txt        optional sentinel holding the job URL
//! <root>/<job_number>/**/<image>     any depth below the job prefix
//! ```
//!
//! ## Example
//! ```rust,ignore
//! use image_hash_indexer::core::enumerator::{EnumerateConfig, JobEnumerator};
//!
//! let enumerator = JobEnumerator::new(&store, EnumerateConfig::new("images/"));
//! for candidate in enumerator.start()? {
//!     println!("{} ({})", candidate.key, candidate.job.job_number);
//! }
//! ```

mod filter;
mod walker;

pub use filter::{ImageKeyFilter, DEFAULT_EXTENSIONS};
pub use walker::{EnumerateConfig, Enumeration, EnumerationStats, JobEnumerator, SENTINEL_NAME};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A logical group of objects sharing one child prefix of the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Full prefix of the job, ending in `/`
    pub prefix: String,
    /// Last path segment of the prefix
    pub job_number: String,
    /// Contents of the job's sentinel object, empty when absent
    pub job_url: String,
}

impl Job {
    /// Extract the job number from a job prefix
    pub fn number_from_prefix(prefix: &str) -> String {
        prefix
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// One image considered for hashing in the current run
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Full object key
    pub key: String,
    /// Opaque revision token from the store
    pub fingerprint: String,
    /// Object size in bytes as listed
    pub size: u64,
    /// The job this object belongs to
    pub job: Arc<Job>,
}
