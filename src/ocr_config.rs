//! # OCR Configuration Module
//!
//! This module defines configuration structures for OCR processing,
//! including engine parameters, format limits and the operation timeout.

use std::env;

use crate::errors::{AppError, AppResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng+jpn";
pub const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
pub const MIN_FORMAT_BYTES: usize = 8;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Format-specific file size limits for different image formats
#[derive(Debug, Clone)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to better compression)
    pub png_max: u64,
    /// JPEG format limit (moderate due to lossy compression)
    pub jpeg_max: u64,
    /// BMP format limit (lower due to uncompressed nature)
    pub bmp_max: u64,
    /// TIFF format limit (can be large, multi-page support)
    pub tiff_max: u64,
    /// WebP format limit (phone cameras and browsers export it)
    pub webp_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,  // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024, // 10MB for JPEG
            bmp_max: 5 * 1024 * 1024,   // 5MB for BMP
            tiff_max: 20 * 1024 * 1024, // 20MB for TIFF
            webp_max: 10 * 1024 * 1024, // 10MB for WebP
        }
    }
}

impl FormatSizeLimits {
    /// Size limit for a detected format, `None` when the format is not accepted
    pub fn limit_for(&self, format: image::ImageFormat) -> Option<u64> {
        match format {
            image::ImageFormat::Png => Some(self.png_max),
            image::ImageFormat::Jpeg => Some(self.jpeg_max),
            image::ImageFormat::Bmp => Some(self.bmp_max),
            image::ImageFormat::Tiff => Some(self.tiff_max),
            image::ImageFormat::WebP => Some(self.webp_max),
            _ => None,
        }
    }

    /// Validate format size limits
    pub fn validate(&self) -> AppResult<()> {
        let limits = [
            ("png_max", self.png_max),
            ("jpeg_max", self.jpeg_max),
            ("bmp_max", self.bmp_max),
            ("tiff_max", self.tiff_max),
            ("webp_max", self.webp_max),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.bmp_max > self.png_max {
            return Err(AppError::Config(format!(
                "bmp_max ({}) should not exceed png_max ({})",
                self.bmp_max, self.png_max
            )));
        }

        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    #[default]
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SparseText => "11",
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ModelType {
    /// Fast model (tessdata_fast) - faster processing, lower accuracy
    #[default]
    Fast,
    /// Best model (tessdata_best) - slower processing, higher accuracy
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }

    /// Parse `fast` / `best`, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fast" => Some(ModelType::Fast),
            "best" => Some(ModelType::Best),
            _ => None,
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// OCR language codes; Latin plus the target script
    pub languages: String,
    /// Tesseract model type (Fast vs Best accuracy)
    pub model_type: ModelType,
    /// Page segmentation mode handed to Tesseract
    pub psm_mode: PageSegMode,
    /// Keep the spacing between words instead of collapsing it
    pub preserve_interword_spaces: bool,
    /// Timeout for a single recognition in seconds
    pub operation_timeout_secs: u64,
    /// Buffer size for format detection in bytes
    pub buffer_size: usize,
    /// Minimum bytes required for format detection
    pub min_format_bytes: usize,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            psm_mode: PageSegMode::default(),
            preserve_interword_spaces: true,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            buffer_size: FORMAT_DETECTION_BUFFER_SIZE,
            min_format_bytes: MIN_FORMAT_BYTES,
            format_limits: FormatSizeLimits::default(),
        }
    }
}

impl OcrConfig {
    /// Load OCR settings from `OCR_*` environment variables, falling back to defaults
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(languages) = env::var("OCR_LANGUAGES") {
            config.languages = languages;
        }
        if let Ok(model) = env::var("OCR_MODEL") {
            config.model_type = ModelType::parse(&model).ok_or_else(|| {
                AppError::Config(format!("OCR_MODEL must be 'fast' or 'best', got '{}'", model))
            })?;
        }
        if let Ok(timeout) = env::var("OCR_TIMEOUT_SECS") {
            config.operation_timeout_secs = timeout.parse().map_err(|_| {
                AppError::Config("OCR_TIMEOUT_SECS must be a valid number of seconds".to_string())
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }

        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.operation_timeout_secs > 300 {
            return Err(AppError::Config(
                "operation_timeout_secs cannot be greater than 300 seconds".to_string(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(AppError::Config(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes == 0 {
            return Err(AppError::Config(
                "min_format_bytes must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes > self.buffer_size {
            return Err(AppError::Config(format!(
                "min_format_bytes ({}) cannot exceed buffer_size ({})",
                self.min_format_bytes, self.buffer_size
            )));
        }

        self.format_limits.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_config_defaults() {
        let config = OcrConfig::default();
        assert_eq!(config.languages, "eng+jpn");
        assert_eq!(config.psm_mode, PageSegMode::SingleBlock);
        assert_eq!(config.psm_mode.as_str(), "6");
        assert!(config.preserve_interword_spaces);
        assert_eq!(config.operation_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[allow(unused_assignments)]
    fn test_ocr_config_validation() {
        let mut config = OcrConfig::default();

        config.languages = "  ".to_string();
        assert!(config.validate().is_err());
        config.languages = DEFAULT_LANGUAGES.to_string();

        config.operation_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.operation_timeout_secs = 301;
        assert!(config.validate().is_err());
        config.operation_timeout_secs = 30;

        config.min_format_bytes = 64;
        assert!(config.validate().is_err());
        config.min_format_bytes = MIN_FORMAT_BYTES;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_format_size_limits() {
        let mut limits = FormatSizeLimits::default();
        assert_eq!(limits.limit_for(image::ImageFormat::Png), Some(15 * 1024 * 1024));
        assert_eq!(limits.limit_for(image::ImageFormat::Gif), None);

        limits.bmp_max = 20 * 1024 * 1024;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_model_type_parse() {
        assert_eq!(ModelType::parse("Best"), Some(ModelType::Best));
        assert_eq!(ModelType::parse("fast"), Some(ModelType::Fast));
        assert_eq!(ModelType::parse("huge"), None);
        assert_eq!(ModelType::Best.tessdata_dir(), "tessdata_best");
    }
}
