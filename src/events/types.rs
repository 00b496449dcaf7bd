//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by an indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Enumeration phase events
    Enumerate(EnumerateEvent),
    /// Hashing phase events
    Hash(HashEvent),
    /// Index and state persistence events
    Index(IndexEvent),
    /// Run-level events
    Pipeline(PipelineEvent),
}

/// Events during enumeration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnumerateEvent {
    /// Listing of the root prefix has started
    Started { root: String },
    /// A job was listed
    JobFound { job_number: String, images: usize },
    /// A job could not be listed and was skipped
    JobFailed { prefix: String, message: String },
    /// Every job has been listed
    Completed { jobs: usize, candidates: usize },
}

/// Which step of processing one object failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    /// Reading the object bytes from the store
    Fetch,
    /// Decoding or hashing the image
    Decode,
    /// Processing panicked
    Panic,
}

/// Events during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Workers have started
    Started { workers: usize },
    /// Progress update after each finished object
    Progress(HashProgress),
    /// An object failed and was skipped
    Skipped {
        key: String,
        stage: FailureStage,
        message: String,
    },
    /// Hashing completed
    Completed {
        processed: usize,
        failed: usize,
        skipped_unchanged: usize,
    },
}

/// Progress information during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    /// Objects finished (hashed or failed)
    pub completed: usize,
    /// Objects submitted to workers so far
    pub submitted: usize,
    /// Objects skipped because their fingerprint is unchanged
    pub skipped_unchanged: usize,
    /// Key of the object just finished
    pub current_key: String,
}

/// Events while merging and persisting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexEvent {
    /// The existing index was loaded
    Loaded { rows: usize },
    /// Nothing changed; index and state were left untouched
    Unchanged,
    /// The merged index was written
    Written { path: PathBuf, rows: usize },
    /// The state snapshot was persisted
    StatePersisted { path: PathBuf, entries: usize },
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Run has started
    Started { run_id: String },
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// The timeout or a cancellation stopped hashing early
    Interrupted,
    /// Run completed
    Completed { summary: PipelineSummary },
    /// Run failed with a fatal error
    Error { message: String },
}

/// Phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Loading,
    Enumerating,
    Hashing,
    Writing,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Jobs discovered under the root
    pub jobs_discovered: usize,
    /// Candidates found across all jobs
    pub candidates_found: usize,
    /// Objects hashed successfully
    pub processed: usize,
    /// Objects skipped as unchanged
    pub skipped_unchanged: usize,
    /// Objects that failed
    pub failed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Loading => write!(f, "Loading"),
            PipelinePhase::Enumerating => write!(f, "Enumerating"),
            PipelinePhase::Hashing => write!(f, "Hashing"),
            PipelinePhase::Writing => write!(f, "Writing"),
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Fetch => write!(f, "fetch"),
            FailureStage::Decode => write!(f, "decode"),
            FailureStage::Panic => write!(f, "panic"),
        }
    }
}
