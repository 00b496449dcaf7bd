//! # Image Hash Indexer
//!
//! Builds and incrementally maintains a perceptual-hash index of the images
//! stored under a prefix of an object store.
//!
//! ## Core Philosophy
//! - **Only hash what changed** - fingerprints decide, unchanged objects are never fetched
//! - **One bad image never stops a run** - failures are reported per object
//! - **The checkpoint never runs ahead of the index** - state is saved after the index
//!
//! ## Architecture
//! - `core` - Store access, enumeration, hashing, state, index and the run pipeline
//! - `config` - Run settings with defaults
//! - `events` - Event-driven progress reporting
//! - `error` - Error types per phase

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::IndexerConfig;
pub use crate::core::pipeline::{IndexRun, RunReport};
pub use error::{IndexerError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Filtering follows
/// `RUST_LOG`; calling it twice is harmless.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("A global tracing subscriber is already installed");
    }
}
