//! # Pipeline Module
//!
//! Orchestrates one incremental indexing run.
//!
//! ## Pipeline Stages
//! 1. **Load** - Read the existing index and state snapshot
//! 2. **Enumerate** - List jobs and their image objects, lazily
//! 3. **Hash** - Hash changed objects on a fixed worker pool
//! 4. **Write** - Merge rows into the index, write it, then persist state
//!
//! ## Parallelism
//! A bounded crossbeam queue feeds scoped worker threads; rayon hashes the
//! permutations of each image in parallel.

mod executor;
mod runner;

pub use executor::{
    CancellationToken, HashOrchestrator, HashOrchestratorBuilder, HashSummary, ItemFailure,
    OrchestratorOutcome, DEFAULT_MAX_OBJECT_BYTES,
};
pub use runner::{IndexRun, RunReport};
