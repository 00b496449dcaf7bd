//! # hash-index CLI
//!
//! Command-line interface for the image hash indexer.
//!
//! ## Usage
//! ```bash
//! hash-index build --store-root /data/bucket
//! hash-index build --store-root /data/bucket --mode advanced --format parquet
//! ```

mod cli;

use image_hash_indexer::Result;

fn main() -> Result<()> {
    image_hash_indexer::init_tracing();
    cli::run()
}
