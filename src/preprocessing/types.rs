//! # Shared Types for Image Preprocessing
//!
//! Types and errors shared by the preprocessing sub-modules.

use image::DynamicImage;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Failed to load or decode image
    ImageLoad { message: String },
    /// Image has no pixels
    EmptyImage,
    /// Re-encoding the result failed
    Encode { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::ImageLoad { message } => {
                write!(f, "[PREPROCESS_DECODE] Failed to load image: {}", message)
            }
            PreprocessingError::EmptyImage => {
                write!(f, "[PREPROCESS_DECODE] Image has zero width or height")
            }
            PreprocessingError::Encode { message } => {
                write!(f, "[PREPROCESS_ENCODE] Failed to encode image: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Result of a width-bounded scaling operation.
#[derive(Debug, Clone)]
pub struct ScaledImageResult {
    /// The scaled image
    pub image: DynamicImage,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// New image dimensions (width, height)
    pub new_dimensions: (u32, u32),
    /// Whether the image was actually resized
    pub downscaled: bool,
}

/// Result of contrast boost and binarization.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// Black and white image, identical on all three channels
    pub image: image::RgbImage,
    /// Pixels that ended up white
    pub white_pixels: u64,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Canonical bitmap handed to the recognizer.
#[derive(Clone)]
pub struct PreprocessedImage {
    /// PNG encoded bytes
    pub png: Vec<u8>,
    /// Final dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Whether the width bound forced a resize
    pub downscaled: bool,
}

impl std::fmt::Debug for PreprocessedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessedImage")
            .field("png", &self.png.len())
            .field("dimensions", &self.dimensions)
            .field("downscaled", &self.downscaled)
            .finish()
    }
}
