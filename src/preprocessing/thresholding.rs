//! # Image Thresholding Module
//!
//! Fixed contrast boost followed by a fixed binarization threshold.
//! The transform is deliberately simple and deterministic; it does not adapt
//! to the image histogram.

use image::{DynamicImage, Rgb, RgbImage};

use super::types::ThresholdedImageResult;

/// Slope of the contrast boost around mid-gray.
pub const CONTRAST_SLOPE: f32 = 1.4;

/// Boosted luminance above this value becomes white.
pub const BINARY_THRESHOLD: f32 = 145.0;

/// Perceived brightness of an RGB pixel.
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Stretch `value` away from 128 by [`CONTRAST_SLOPE`].
pub fn boost_contrast(value: f32) -> f32 {
    (value - 128.0) * CONTRAST_SLOPE + 128.0
}

/// Output intensity for one input pixel: 255 or 0.
pub fn binarize_pixel(r: u8, g: u8, b: u8) -> u8 {
    if boost_contrast(luminance(r, g, b)) > BINARY_THRESHOLD {
        255
    } else {
        0
    }
}

/// Applies the contrast boost and threshold to every pixel.
///
/// Alpha is discarded; the result has the same value on all three channels.
pub fn apply_binary_threshold(image: &DynamicImage) -> ThresholdedImageResult {
    let start_time = std::time::Instant::now();

    let rgb = image.to_rgb8();
    let mut binary = RgbImage::new(rgb.width(), rgb.height());
    let mut white_pixels = 0u64;

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let value = binarize_pixel(pixel[0], pixel[1], pixel[2]);
        if value == 255 {
            white_pixels += 1;
        }
        binary.put_pixel(x, y, Rgb([value, value, value]));
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Binarization completed in {}ms: dimensions={}x{}, white_pixels={}",
        processing_time.as_millis(),
        binary.width(),
        binary.height(),
        white_pixels
    );

    ThresholdedImageResult {
        image: binary,
        white_pixels,
        processing_time_ms: processing_time.as_millis() as u32,
    }
}
