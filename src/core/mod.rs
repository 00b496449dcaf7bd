//! # Core Module
//!
//! The incremental hashing engine.
//!
//! ## Modules
//! - `store` - Object store contract, local filesystem and in-memory stores
//! - `enumerator` - Discovers jobs and their image objects
//! - `state` - Remembers which fingerprints were already hashed
//! - `hasher` - Computes perceptual hashes over image permutations
//! - `index` - The deduplicated hash table and its file formats
//! - `pipeline` - Orchestrates the full run

pub(crate) mod durable;
pub mod enumerator;
pub mod hasher;
pub mod index;
pub mod pipeline;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use enumerator::{Candidate, Job};
pub use hasher::HashMode;
pub use index::{HashIndex, HashRow, IndexFormat};
pub use store::{ObjectStore, ObjectSummary};
