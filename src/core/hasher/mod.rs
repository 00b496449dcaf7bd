//! # Hasher Module
//!
//! Computes a fixed, named set of perceptual hashes for one image.
//!
//! ## How It Works
//! 1. Decode the object bytes (zune-jpeg fast path for JPEG)
//! 2. Resize to the configured grid and convert to grayscale
//! 3. Apply every permutation of the active [`HashMode`]
//! 4. Hash each permutation with a DCT-based pHash ([`HASH_BITS`] bits)
//!
//! The output is a pure function of the bytes, mode and resize dimensions.
//!
//! ## Example
//! ```rust,ignore
//! use image_hash_indexer::core::hasher::{HasherConfig, HashMode};
//!
//! let hasher = HasherConfig::new()
//!     .mode(HashMode::Advanced)
//!     .resize(256, 256)
//!     .build()?;
//!
//! let hashes = hasher.hash_bytes("jobs/1/a.jpg", &bytes)?;
//! assert!(hashes.contains_key("original_hash"));
//! ```

pub mod fast_decode;
pub mod fast_resize;
mod perceptual;
mod permutation;
mod traits;

pub use perceptual::{PerceptualHasher, HASH_BITS, HASH_SIDE};
pub use permutation::Permutation;
pub use traits::{HashAlgorithm, HashMode, ImageHashValue};

use crate::error::HashError;
use fast_decode::FastDecoder;
use fast_resize::FastResizer;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Default resize width and height
pub const DEFAULT_RESIZE: (u32, u32) = (256, 256);

/// Configuration builder for the permutation hasher
#[derive(Debug, Clone)]
pub struct HasherConfig {
    mode: HashMode,
    width: u32,
    height: u32,
}

impl HasherConfig {
    /// Create a new hasher configuration with defaults
    pub fn new() -> Self {
        Self {
            mode: HashMode::Basic,
            width: DEFAULT_RESIZE.0,
            height: DEFAULT_RESIZE.1,
        }
    }

    /// Set the permutation mode
    pub fn mode(mut self, mode: HashMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the preprocessing grid size
    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Build the hasher
    pub fn build(self) -> Result<PermutationHasher, HashError> {
        if self.width == 0 || self.height == 0 {
            return Err(HashError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        Ok(PermutationHasher {
            permutations: Permutation::for_mode(self.mode),
            algorithm: Box::new(PerceptualHasher::new()),
            config: self,
        })
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes one image under every permutation of a mode
pub struct PermutationHasher {
    config: HasherConfig,
    permutations: Vec<Permutation>,
    algorithm: Box<dyn HashAlgorithm>,
}

impl PermutationHasher {
    /// Column names produced by [`hash_bytes`](Self::hash_bytes), in order
    pub fn column_names(&self) -> Vec<String> {
        self.permutations.iter().map(Permutation::column_name).collect()
    }

    /// Decode `bytes` and hash every permutation.
    ///
    /// `key` is only used to label errors.
    pub fn hash_bytes(&self, key: &str, bytes: &[u8]) -> Result<BTreeMap<String, String>, HashError> {
        let image = FastDecoder::decode(bytes).map_err(|e| e.with_key(key))?;

        let base = FastResizer::new()
            .resize_to_grayscale(&image, self.config.width, self.config.height)
            .map_err(|e| e.with_key(key))?;

        self.permutations
            .par_iter()
            .map(|permutation| {
                let variant = permutation.apply(&base);
                let hash = self.algorithm.hash_luma(&variant)?;
                Ok::<_, HashError>((permutation.column_name(), hash.to_hex()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(seed: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(120, 90, |x, y| {
            Rgb([
                ((x * seed + y) % 256) as u8,
                ((y * 3 + seed) % 256) as u8,
                ((x ^ y) % 256) as u8,
            ])
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn config_defaults_to_basic_256() {
        let config = HasherConfig::new();
        assert_eq!(config.mode, HashMode::Basic);
        assert_eq!((config.width, config.height), (256, 256));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let result = HasherConfig::new().resize(0, 10).build();
        assert!(matches!(result, Err(HashError::InvalidDimensions { .. })));
    }

    #[test]
    fn basic_mode_produces_three_hex_hashes() {
        let hasher = HasherConfig::new().resize(64, 64).build().unwrap();
        let hashes = hasher.hash_bytes("a.png", &png_bytes(3)).unwrap();

        let keys: Vec<_> = hashes.keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        for column in hasher.column_names() {
            let hex = &hashes[&column];
            assert_eq!(hex.len(), (HASH_BITS / 4) as usize);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        let hasher = HasherConfig::new()
            .mode(HashMode::Advanced)
            .resize(64, 64)
            .build()
            .unwrap();
        let bytes = png_bytes(5);

        let first = hasher.hash_bytes("a.png", &bytes).unwrap();
        let second = hasher.hash_bytes("a.png", &bytes).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn advanced_columns_are_strict_superset_of_basic() {
        let bytes = png_bytes(7);
        let basic = HasherConfig::new().resize(64, 64).build().unwrap();
        let advanced = HasherConfig::new()
            .mode(HashMode::Advanced)
            .resize(64, 64)
            .build()
            .unwrap();

        let basic_hashes = basic.hash_bytes("a.png", &bytes).unwrap();
        let advanced_hashes = advanced.hash_bytes("a.png", &bytes).unwrap();

        assert!(advanced_hashes.len() > basic_hashes.len());
        for (column, hex) in &basic_hashes {
            assert_eq!(advanced_hashes.get(column), Some(hex));
        }
    }

    #[test]
    fn corrupt_bytes_report_unreadable_with_key() {
        let hasher = HasherConfig::new().build().unwrap();
        let result = hasher.hash_bytes("jobs/1/bad.jpg", b"not an image");

        match result {
            Err(HashError::Unreadable { key, .. }) => assert_eq!(key, "jobs/1/bad.jpg"),
            other => panic!("expected Unreadable, got {:?}", other),
        }
    }
}
