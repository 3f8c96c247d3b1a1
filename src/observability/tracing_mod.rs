//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - Tracing span creation utilities

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging with tracing and configuration
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("photo_ocr_keeper={}", config.log_level).parse()?);

    match config.effective_format() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::debug!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str, image_name: &str) -> tracing::Span {
    tracing::info_span!(
        "ocr_operation",
        operation = operation,
        image_name = image_name,
        component = "ocr"
    )
}

/// Create a span for a whole batch run
pub fn batch_span(queued: usize, targets: usize) -> tracing::Span {
    tracing::info_span!(
        "batch_run",
        queued = queued,
        targets = targets,
        component = "pipeline"
    )
}

/// Create a span for storage operations
pub fn storage_span(operation: &str, key: &str) -> tracing::Span {
    tracing::info_span!(
        "storage_operation",
        operation = operation,
        key = key,
        component = "storage"
    )
}
