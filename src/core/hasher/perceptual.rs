//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to keep only the
//! low-frequency structure of the image. This makes it robust to:
//! - Scaling
//! - Minor rotations
//! - Brightness/contrast changes
//! - Compression artifacts
//!
//! We use the image_hasher crate's DCT preprocessing with a mean threshold.

use super::traits::{HashAlgorithm, ImageHashValue};
use crate::error::HashError;
use image::{DynamicImage, GrayImage};
use image_hasher::{HashAlg, HasherConfig as ImageHasherConfig};

/// Side length of the hash grid
pub const HASH_SIDE: u32 = 8;

/// Bits in every hash. Changing this changes the hex length of every column,
/// so an index must never mix hashes built with different values.
pub const HASH_BITS: u32 = HASH_SIDE * HASH_SIDE;

/// Perceptual Hash (pHash) implementation using DCT
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    /// Create a new pHash hasher producing [`HASH_BITS`] bits
    pub fn new() -> Self {
        let hasher = ImageHasherConfig::new()
            .hash_size(HASH_SIDE, HASH_SIDE)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();

        Self { hasher }
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_luma(&self, image: &GrayImage) -> Result<ImageHashValue, HashError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::ComputationFailed(
                "cannot hash an empty image".to_string(),
            ));
        }

        let dynamic = DynamicImage::ImageLuma8(image.clone());
        let hash = self.hasher.hash_image(&dynamic);
        let bytes = hash.as_bytes().to_vec();

        if bytes.len() * 8 != HASH_BITS as usize {
            return Err(HashError::ComputationFailed(format!(
                "expected {} hash bits, got {}",
                HASH_BITS,
                bytes.len() * 8
            )));
        }

        Ok(ImageHashValue::new(bytes))
    }

    fn bit_count(&self) -> u32 {
        HASH_BITS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn gradient_image(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 3) % 256) as u8])
        })
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = PerceptualHasher::new();
        let image = gradient_image(64, 64);

        let hash1 = hasher.hash_luma(&image).unwrap();
        let hash2 = hasher.hash_luma(&image).unwrap();

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn hash_has_fixed_length() {
        let hasher = PerceptualHasher::new();
        let hash = hasher.hash_luma(&gradient_image(40, 30)).unwrap();

        assert_eq!(hash.bit_count(), HASH_BITS);
        assert_eq!(hash.to_hex().len(), (HASH_BITS / 4) as usize);
    }

    #[test]
    fn empty_image_is_rejected() {
        let hasher = PerceptualHasher::new();
        let empty: GrayImage = ImageBuffer::new(0, 0);
        assert!(hasher.hash_luma(&empty).is_err());
    }
}
