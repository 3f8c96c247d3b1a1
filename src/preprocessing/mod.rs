//! # Image Preprocessing Module
//!
//! Normalizes a raw photo into a canonical bitmap before recognition:
//! decode, bound the width, boost contrast, binarize, re-encode as PNG.
//!
//! The module is organized into focused sub-modules:
//! - `scaling`: width-bounded, aspect-preserving downscaling
//! - `thresholding`: luminance, contrast boost and fixed threshold
//! - `types`: shared types and error definitions

pub mod scaling;
pub mod thresholding;
pub mod types;

use std::io::Cursor;
use std::time::Instant;

use image::{DynamicImage, ImageFormat};

pub use scaling::ImageScaler;
pub use thresholding::apply_binary_threshold;
pub use types::{PreprocessedImage, PreprocessingError, ScaledImageResult, ThresholdedImageResult};

use crate::observability;

/// Decode `bytes`, format guessed from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PreprocessingError> {
    let image = image::load_from_memory(bytes).map_err(|e| PreprocessingError::ImageLoad {
        message: e.to_string(),
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    Ok(image)
}

/// Encode an image as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PreprocessingError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PreprocessingError::Encode {
            message: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

/// Full preprocessing pass. Pure and deterministic for a given input.
pub fn preprocess(
    bytes: &[u8],
    scaler: &ImageScaler,
) -> Result<PreprocessedImage, PreprocessingError> {
    let start_time = Instant::now();

    let result = decode_image(bytes).and_then(|image| {
        let scaled = scaler.scale(&image);
        let thresholded = apply_binary_threshold(&scaled.image);
        let binary = DynamicImage::ImageRgb8(thresholded.image);
        Ok(PreprocessedImage {
            png: encode_png(&binary)?,
            dimensions: scaled.new_dimensions,
            downscaled: scaled.downscaled,
        })
    });

    let downscaled = result.as_ref().map(|r| r.downscaled).unwrap_or(false);
    observability::record_preprocessing_metrics(result.is_ok(), start_time.elapsed(), downscaled);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let mut image = RgbImage::new(width, height);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            *pixel = if x % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([20, 20, 20])
            };
        }
        encode_png(&DynamicImage::ImageRgb8(image)).unwrap()
    }

    #[test]
    fn test_preprocess_produces_binary_png() {
        let result = preprocess(&sample_png(4, 2), &ImageScaler::new()).unwrap();
        assert_eq!(result.dimensions, (4, 2));
        assert!(!result.downscaled);

        let decoded = image::load_from_memory(&result.png).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(decoded.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_preprocess_bounds_width() {
        let result = preprocess(&sample_png(20, 10), &ImageScaler::with_max_width(10)).unwrap();
        assert!(result.downscaled);
        let decoded = image::load_from_memory(&result.png).unwrap();
        assert_eq!(decoded.dimensions(), (10, 5));
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let input = sample_png(6, 3);
        let first = preprocess(&input, &ImageScaler::new()).unwrap();
        let second = preprocess(&input, &ImageScaler::new()).unwrap();
        assert_eq!(first.png, second.png);
    }

    #[test]
    fn test_undecodable_bytes_are_rejected() {
        let result = preprocess(b"definitely not an image", &ImageScaler::new());
        assert!(matches!(result, Err(PreprocessingError::ImageLoad { .. })));
    }
}
