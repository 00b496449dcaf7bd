//! Trait definitions for perceptual hashing.

use crate::error::HashError;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which permutation set to hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// Original image plus horizontal and vertical mirrors
    #[default]
    Basic,
    /// Basic set plus small rotations, a mild zoom and tonal shifts
    Advanced,
}

impl HashMode {
    /// Get a human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            HashMode::Basic => "original, horizontal flip, vertical flip",
            HashMode::Advanced => {
                "basic set plus ±5° rotations, 10% zoom, brightness and contrast shifts"
            }
        }
    }
}

impl std::fmt::Display for HashMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashMode::Basic => write!(f, "basic"),
            HashMode::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for HashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(HashMode::Basic),
            "advanced" => Ok(HashMode::Advanced),
            other => Err(format!("unknown hash mode '{}' (expected basic or advanced)", other)),
        }
    }
}

/// Trait for hash algorithm implementations
///
/// Input is an already preprocessed single-channel image.
pub trait HashAlgorithm: Send + Sync {
    /// Compute a hash from a luminance image
    fn hash_luma(&self, image: &GrayImage) -> Result<ImageHashValue, HashError>;

    /// Number of bits every hash from this algorithm has
    fn bit_count(&self) -> u32;
}

/// Concrete hash value type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashValue {
    /// The raw hash bytes
    bytes: Vec<u8>,
}

impl ImageHashValue {
    /// Create a new hash value
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the raw hash bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the hash as a lowercase hexadecimal string
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the total number of bits in this hash
    pub fn bit_count(&self) -> u32 {
        (self.bytes.len() * 8) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_hex_produces_lowercase_string() {
        let hash = ImageHashValue::new(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(hash.to_hex(), "deadbeef");
    }

    #[test]
    fn to_hex_keeps_leading_zeros() {
        let hash = ImageHashValue::new(vec![0x00, 0x0A]);
        assert_eq!(hash.to_hex(), "000a");
        assert_eq!(hash.bit_count(), 16);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Basic".parse::<HashMode>().unwrap(), HashMode::Basic);
        assert_eq!("ADVANCED".parse::<HashMode>().unwrap(), HashMode::Advanced);
        assert!("fancy".parse::<HashMode>().is_err());
    }

    #[test]
    fn mode_display_round_trips() {
        for mode in [HashMode::Basic, HashMode::Advanced] {
            assert_eq!(mode.to_string().parse::<HashMode>().unwrap(), mode);
        }
    }
}
