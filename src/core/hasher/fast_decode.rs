//! Fast image decoding with format-specific optimizations.
//!
//! Object bytes come straight from the store, so the format is sniffed
//! from magic bytes rather than trusted from the key's extension.
//! Uses zune-jpeg for JPEG content (1.5-2x faster than image crate),
//! falls back to image crate for other formats.

use crate::error::HashError;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

fn unreadable(reason: impl Into<String>) -> HashError {
    HashError::Unreadable {
        key: String::new(),
        reason: reason.into(),
    }
}

/// Fast image decoder that uses optimized decoders per format
pub struct FastDecoder;

impl FastDecoder {
    /// Decode image bytes using the fastest available decoder.
    ///
    /// Errors carry an empty key; callers attach it with
    /// [`HashError::with_key`].
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, HashError> {
        if bytes.is_empty() {
            return Err(unreadable("object is empty"));
        }

        let image = if bytes.starts_with(&JPEG_MAGIC) {
            Self::decode_jpeg(bytes).or_else(|_| Self::decode_fallback(bytes))?
        } else {
            Self::decode_fallback(bytes)?
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(unreadable("image has zero dimensions"));
        }

        Ok(image)
    }

    /// Fast JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage, HashError> {
        // Configure decoder to output RGB
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder
            .decode()
            .map_err(|e| unreadable(format!("zune-jpeg decode failed: {:?}", e)))?;

        let info = decoder
            .info()
            .ok_or_else(|| unreadable("failed to get JPEG info"))?;

        let width = info.width as u32;
        let height = info.height as u32;

        // Get actual output colorspace after decoding
        let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

        let image = match out_colorspace {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| unreadable("failed to create RGB buffer"))?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| unreadable("failed to create RGBA buffer"))?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| unreadable("failed to create Luma buffer"))?;
                DynamicImage::ImageLuma8(buffer)
            }
            _ => return Self::decode_fallback(bytes),
        };

        Ok(image)
    }

    /// Fallback to image crate with format sniffing
    fn decode_fallback(bytes: &[u8]) -> Result<DynamicImage, HashError> {
        image::load_from_memory(bytes).map_err(|e| unreadable(e.to_string()))
    }
}
