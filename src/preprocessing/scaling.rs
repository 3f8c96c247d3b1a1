//! # Image Scaling Module
//!
//! Bounds image width before recognition. Photos straight from a phone camera
//! are far larger than the recognizer needs; narrower images are left alone.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use super::types::ScaledImageResult;

/// Downscales images wider than a fixed bound, preserving aspect ratio.
#[derive(Debug, Clone)]
pub struct ImageScaler {
    max_width: u32,
}

impl Default for ImageScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageScaler {
    /// Widest image passed to the recognizer unchanged.
    pub const DEFAULT_MAX_WIDTH: u32 = 1600;

    pub fn new() -> Self {
        Self {
            max_width: Self::DEFAULT_MAX_WIDTH,
        }
    }

    pub fn with_max_width(max_width: u32) -> Self {
        Self {
            max_width: max_width.max(1),
        }
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// Target dimensions for a `width` x `height` image.
    ///
    /// The height is rounded and never drops below one pixel.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width {
            return (width, height);
        }
        let ratio = self.max_width as f64 / width as f64;
        let new_height = ((height as f64) * ratio).round().max(1.0) as u32;
        (self.max_width, new_height)
    }

    /// Scale `image` so its width does not exceed the bound.
    pub fn scale(&self, image: &DynamicImage) -> ScaledImageResult {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = self.target_dimensions(width, height);

        if (new_width, new_height) == (width, height) {
            return ScaledImageResult {
                image: image.clone(),
                original_dimensions: (width, height),
                new_dimensions: (width, height),
                downscaled: false,
            };
        }

        tracing::debug!(
            target: "ocr_preprocessing",
            "Downscaling {}x{} to {}x{}",
            width,
            height,
            new_width,
            new_height
        );

        ScaledImageResult {
            image: image.resize_exact(new_width, new_height, FilterType::Triangle),
            original_dimensions: (width, height),
            new_dimensions: (new_width, new_height),
            downscaled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_images_are_untouched() {
        let scaler = ImageScaler::new();
        assert_eq!(scaler.target_dimensions(1600, 900), (1600, 900));
        assert_eq!(scaler.target_dimensions(20, 10), (20, 10));
    }

    #[test]
    fn test_wide_images_keep_aspect_ratio() {
        let scaler = ImageScaler::new();
        assert_eq!(scaler.target_dimensions(3200, 2400), (1600, 1200));
        assert_eq!(scaler.target_dimensions(4000, 3000), (1600, 1200));
        // Extremely wide strip still keeps a row
        assert_eq!(scaler.target_dimensions(100_000, 2), (1600, 1));
    }

    #[test]
    fn test_scale_resizes_pixels() {
        let scaler = ImageScaler::with_max_width(4);
        let image = DynamicImage::new_rgb8(8, 6);
        let result = scaler.scale(&image);
        assert!(result.downscaled);
        assert_eq!(result.image.dimensions(), (4, 3));
        assert_eq!(result.original_dimensions, (8, 6));
    }
}
