//! Shrinks screenshots before they go into a push notification payload.
//! Grounded on the same `image::codecs::jpeg::JpegEncoder` usage pattern
//! seen across the camera-adjacent example repos.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

pub const DEFAULT_QUALITY: u8 = 60;
pub const DEFAULT_MAX_WIDTH: u32 = 800;

/// Re-encodes `input` as a quality/width-clamped JPEG. Falls back to the
/// original bytes if compression doesn't actually shrink the payload.
pub fn compress(input: &[u8], quality: u8, max_width: u32) -> Vec<u8> {
    let Ok(img) = image::load_from_memory(input) else {
        return input.to_vec();
    };
    let (width, _height) = img.dimensions();
    let resized = if width > max_width {
        img.resize(max_width, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    if encoder.encode_image(&resized).is_err() {
        return input.to_vec();
    }

    if out.len() < input.len() {
        out
    } else {
        input.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 100);
        encoder.encode_image(&image::DynamicImage::ImageRgb8(img)).unwrap();
        out
    }

    #[test]
    fn compress_shrinks_a_wide_image() {
        let original = sample_jpeg(1600, 900);
        let compressed = compress(&original, DEFAULT_QUALITY, DEFAULT_MAX_WIDTH);
        assert!(compressed.len() < original.len());
    }

    #[test]
    fn compress_falls_back_to_original_on_garbage_input() {
        let garbage = vec![0u8, 1, 2, 3];
        let result = compress(&garbage, DEFAULT_QUALITY, DEFAULT_MAX_WIDTH);
        assert_eq!(result, garbage);
    }
}
