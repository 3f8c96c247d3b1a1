//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Tracing spans for OCR, batch and storage operations
//! - Metric recording through the `metrics` facade

pub mod metrics;
pub mod tracing_mod;

use anyhow::Result;

use crate::observability_config::ObservabilityConfig;

pub use self::metrics::*;
pub use self::tracing_mod::{batch_span, ocr_span, storage_span};

/// Initialize logging with a custom configuration
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    tracing_mod::init_tracing_with_config(config)?;

    tracing::debug!(environment = %config.environment, "Observability initialized");
    Ok(())
}
