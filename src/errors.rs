//! # Application Error Types
//!
//! This module defines common error types used throughout photo-ocr-keeper.
//! It provides structured error handling for the slot store, the pending queue,
//! storage and the OCR pipeline.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (slot addresses, page ids, inputs)
    Validation(String),
    /// Durable storage errors
    Storage(String),
    /// OCR processing errors
    Ocr(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Storage(msg) => write!(f, "[STORAGE] {}", msg),
            AppError::Ocr(msg) => write!(f, "[OCR] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::storage::StorageError> for AppError {
    fn from(err: crate::storage::StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<crate::ocr_errors::OcrError> for AppError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        AppError::Ocr(err.to_string())
    }
}

impl From<crate::slots::SlotError> for AppError {
    fn from(err: crate::slots::SlotError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log OCR processing errors with image and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        image_name: Option<&str>,
        image_size: Option<u64>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            image_name = ?image_name,
            image_size_bytes = ?image_size,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log preprocessing errors for a single queued image
    pub fn log_preprocessing_error(
        error: &impl std::fmt::Display,
        image_name: &str,
        image_size: usize,
    ) {
        error!(
            error = %error,
            operation = "preprocess",
            image_name = %image_name,
            image_size_bytes = %image_size,
            "Image preprocessing failed"
        );
    }

    /// Log storage errors with the key being read or written
    pub fn log_storage_error(error: &impl std::fmt::Display, operation: &str, key: &str) {
        error!(
            error = %error,
            operation = %operation,
            storage_key = %key,
            "Storage operation failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display_prefixes() {
        assert_eq!(
            AppError::Config("bad".to_string()).to_string(),
            "[CONFIG] bad"
        );
        assert_eq!(
            AppError::Storage("disk full".to_string()).to_string(),
            "[STORAGE] disk full"
        );
    }

    #[test]
    fn test_ocr_error_converts_to_app_error() {
        let err: AppError = crate::ocr_errors::OcrError::Timeout("30s".to_string()).into();
        assert!(matches!(err, AppError::Ocr(_)));
        assert!(err.to_string().contains("OCR_TIMEOUT"));
    }
}
