//! Deterministic image permutations.
//!
//! Every permutation takes the preprocessed luminance grid and returns a
//! grid of the same size. Parameters are fixed constants: changing any of
//! them changes the hashes of every row and breaks comparability with
//! existing indexes.

use super::traits::HashMode;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};

/// Grey level used for pixels rotated in from outside the image
const ROTATION_FILL: u8 = 128;

/// Keys cubic convolution coefficient, the usual bicubic kernel
const BICUBIC_A: f64 = -0.5;

/// One named transform of the preprocessed image
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Permutation {
    Original,
    HorizontalFlip,
    VerticalFlip,
    /// Counter-clockwise rotation in degrees
    Rotate(i32),
    /// Central crop keeping `100 - n` percent, scaled back up
    Zoom(u32),
    /// Brightness factor (1.0 = unchanged)
    Brightness(f32),
    /// Contrast factor (1.0 = unchanged)
    Contrast(f32),
}

const BASIC: [Permutation; 3] = [
    Permutation::Original,
    Permutation::HorizontalFlip,
    Permutation::VerticalFlip,
];

const ADVANCED_EXTRA: [Permutation; 7] = [
    Permutation::Rotate(-5),
    Permutation::Rotate(5),
    Permutation::Zoom(10),
    Permutation::Brightness(0.9),
    Permutation::Contrast(0.9),
    Permutation::Brightness(1.1),
    Permutation::Contrast(1.1),
];

impl Permutation {
    /// The ordered permutation set for a mode
    pub fn for_mode(mode: HashMode) -> Vec<Permutation> {
        match mode {
            HashMode::Basic => BASIC.to_vec(),
            HashMode::Advanced => BASIC.iter().chain(ADVANCED_EXTRA.iter()).copied().collect(),
        }
    }

    /// Stable name of the permutation
    pub fn name(&self) -> String {
        match self {
            Permutation::Original => "original".to_string(),
            Permutation::HorizontalFlip => "h_flip".to_string(),
            Permutation::VerticalFlip => "v_flip".to_string(),
            Permutation::Rotate(degrees) => format!("rot_{}", degrees),
            Permutation::Zoom(percent) => format!("zoom_{}", percent),
            Permutation::Brightness(factor) => format!("b_{}", factor),
            Permutation::Contrast(factor) => format!("c_{}", factor),
        }
    }

    /// Index column holding this permutation's hash
    pub fn column_name(&self) -> String {
        format!("{}_hash", self.name())
    }

    /// Apply the transform
    pub fn apply(&self, base: &GrayImage) -> GrayImage {
        match *self {
            Permutation::Original => base.clone(),
            Permutation::HorizontalFlip => imageops::flip_horizontal(base),
            Permutation::VerticalFlip => imageops::flip_vertical(base),
            Permutation::Rotate(degrees) => rotate(base, degrees as f64),
            Permutation::Zoom(percent) => zoom(base, zoom_keep(percent)),
            Permutation::Brightness(factor) => brightness(base, factor),
            Permutation::Contrast(factor) => contrast(base, factor),
        }
    }
}

/// Rotate counter-clockwise about the centre with bicubic sampling
fn rotate(base: &GrayImage, degrees: f64) -> GrayImage {
    let (width, height) = base.dimensions();
    let (sin, cos) = (-degrees.to_radians()).sin_cos();
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let max_x = width as f64 - 1.0;
    let max_y = height as f64 - 1.0;

    ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let sx = cos * dx + sin * dy + cx - 0.5;
        let sy = -sin * dx + cos * dy + cy - 0.5;

        if sx < 0.0 || sy < 0.0 || sx > max_x || sy > max_y {
            return Luma([ROTATION_FILL]);
        }

        Luma([bicubic(base, sx, sy)])
    })
}

fn cubic_weight(distance: f64) -> f64 {
    let d = distance.abs();
    if d <= 1.0 {
        ((BICUBIC_A + 2.0) * d - (BICUBIC_A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((BICUBIC_A * d - 5.0 * BICUBIC_A) * d + 8.0 * BICUBIC_A) * d - 4.0 * BICUBIC_A
    } else {
        0.0
    }
}

/// 4x4 cubic convolution, neighbours clamped to the edge
fn bicubic(image: &GrayImage, x: f64, y: f64) -> u8 {
    let (width, height) = image.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let clamp = |v: f64, max: u32| v.clamp(0.0, (max - 1) as f64) as u32;

    let mut total = 0.0;
    for j in -1..=2 {
        let sy = y0 + j as f64;
        let wy = cubic_weight(y - sy);
        for i in -1..=2 {
            let sx = x0 + i as f64;
            let wx = cubic_weight(x - sx);
            let value = image.get_pixel(clamp(sx, width), clamp(sy, height))[0] as f64;
            total += value * wx * wy;
        }
    }

    total.round().clamp(0.0, 255.0) as u8
}

/// Fraction of each side kept when zooming in by `percent`
fn zoom_keep(percent: u32) -> f64 {
    (100 - percent.min(99)) as f64 / 100.0
}

/// Crop the centre and scale it back to the original size
fn zoom(base: &GrayImage, keep: f64) -> GrayImage {
    let (width, height) = base.dimensions();
    let crop_w = ((width as f64 * keep) as u32).max(1);
    let crop_h = ((height as f64 * keep) as u32).max(1);
    let left = (width - crop_w) / 2;
    let top = (height - crop_h) / 2;

    let cropped = imageops::crop_imm(base, left, top, crop_w, crop_h).to_image();
    imageops::resize(&cropped, width, height, FilterType::Lanczos3)
}

/// Blend toward black: `out = in * factor`
fn brightness(base: &GrayImage, factor: f32) -> GrayImage {
    map_pixels(base, |v| v * factor)
}

/// Blend toward the rounded mean grey level
fn contrast(base: &GrayImage, factor: f32) -> GrayImage {
    let count = base.pixels().len().max(1) as f64;
    let total: f64 = base.pixels().map(|p| p[0] as f64).sum();
    let mean = (total / count + 0.5).floor() as f32;

    map_pixels(base, |v| mean + (v - mean) * factor)
}

fn map_pixels(base: &GrayImage, f: impl Fn(f32) -> f32) -> GrayImage {
    let mut out = base.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = f(pixel[0] as f32).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| Luma([(x * 10 + y) as u8]))
    }

    #[test]
    fn basic_mode_names() {
        let names: Vec<_> = Permutation::for_mode(HashMode::Basic)
            .iter()
            .map(Permutation::column_name)
            .collect();
        assert_eq!(names, vec!["original_hash", "h_flip_hash", "v_flip_hash"]);
    }

    #[test]
    fn advanced_mode_extends_basic() {
        let basic = Permutation::for_mode(HashMode::Basic);
        let advanced = Permutation::for_mode(HashMode::Advanced);
        assert_eq!(&advanced[..basic.len()], &basic[..]);

        let names: Vec<_> = advanced.iter().map(Permutation::name).collect();
        assert!(names.contains(&"rot_-5".to_string()));
        assert!(names.contains(&"zoom_10".to_string()));
        assert!(names.contains(&"b_0.9".to_string()));
        assert!(names.contains(&"c_1.1".to_string()));
        assert_eq!(advanced.len(), 10);
    }

    #[test]
    fn flips_mirror_pixels() {
        let image = ramp(4, 3);
        let h = Permutation::HorizontalFlip.apply(&image);
        let v = Permutation::VerticalFlip.apply(&image);

        assert_eq!(h.get_pixel(0, 0), image.get_pixel(3, 0));
        assert_eq!(v.get_pixel(0, 0), image.get_pixel(0, 2));
    }

    #[test]
    fn every_permutation_keeps_dimensions() {
        let image = ramp(20, 12);
        for permutation in Permutation::for_mode(HashMode::Advanced) {
            let out = permutation.apply(&image);
            assert_eq!(out.dimensions(), (20, 12), "{}", permutation.name());
        }
    }

    #[test]
    fn rotation_fills_corners_with_grey() {
        let image: GrayImage = ImageBuffer::from_pixel(50, 50, Luma([0]));
        let rotated = Permutation::Rotate(5).apply(&image);
        assert_eq!(rotated.get_pixel(0, 0)[0], ROTATION_FILL);
        assert_eq!(rotated.get_pixel(25, 25)[0], 0);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let image = ramp(10, 10);
        assert_eq!(rotate(&image, 0.0), image);
    }

    #[test]
    fn bicubic_weights_sum_to_one() {
        for t in [0.0, 0.25, 0.5, 0.9] {
            let sum: f64 = (-1..=2).map(|i| cubic_weight(t - i as f64)).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{}", t);
        }
        assert_eq!(cubic_weight(0.0), 1.0);
        assert_eq!(cubic_weight(1.0), 0.0);
    }

    #[test]
    fn zoom_percent_sets_crop() {
        assert!((zoom_keep(10) - 0.9).abs() < 1e-9);
        assert!((zoom_keep(25) - 0.75).abs() < 1e-9);
        assert!(zoom_keep(100) > 0.0);

        let image = ramp(20, 20);
        assert_ne!(Permutation::Zoom(10).apply(&image), Permutation::Zoom(40).apply(&image));
    }

    #[test]
    fn brightness_scales_toward_black() {
        let image: GrayImage = ImageBuffer::from_pixel(2, 2, Luma([100]));
        assert_eq!(Permutation::Brightness(0.9).apply(&image).get_pixel(0, 0)[0], 90);
        assert_eq!(Permutation::Brightness(1.1).apply(&image).get_pixel(0, 0)[0], 110);
    }

    #[test]
    fn contrast_pivots_on_mean() {
        let image: GrayImage =
            ImageBuffer::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 200 }]));
        let out = Permutation::Contrast(1.1).apply(&image);
        assert_eq!(out.get_pixel(0, 0)[0], 95);
        assert_eq!(out.get_pixel(1, 0)[0], 205);
    }
}
