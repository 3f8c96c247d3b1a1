//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use crate::pipeline::PersistPolicy;
use crate::slots::Capacity;
use crate::text_processing::{CandidatePolicy, MatchMode, MatchSettings};
use std::env;
use std::path::PathBuf;

/// Versioned identifier the whole session is stored under
pub const DEFAULT_STORAGE_KEY: &str = "photo-ocr-keeper-v2";

/// Literal committed into a slot when no candidate could be extracted
pub const DEFAULT_FAILURE_MARKER: &str = "読み取れませんでした";

/// Durable storage and grid capacity settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the session file
    pub data_dir: PathBuf,
    /// Fixed versioned key; the file is `<data_dir>/<key>.json`
    pub storage_key: String,
    /// Page and slot limits
    pub capacity: Capacity,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".photo-ocr-keeper"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            capacity: Capacity::default(),
        }
    }
}

impl StoreConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(AppError::Config("Storage key cannot be empty".to_string()));
        }

        if self
            .storage_key
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        {
            return Err(AppError::Config(format!(
                "Storage key '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
                self.storage_key
            )));
        }

        if self.capacity.max_pages == 0 {
            return Err(AppError::Config("Max pages cannot be 0".to_string()));
        }

        if self.capacity.slots_per_page == 0 {
            return Err(AppError::Config("Slots per page cannot be 0".to_string()));
        }

        if self.capacity.max_slots() > 10_000 {
            return Err(AppError::Config(format!(
                "Total slot capacity {} is unreasonably large (maximum 10000)",
                self.capacity.max_slots()
            )));
        }

        Ok(())
    }
}

/// Settings that shape a batch run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Initial match mode and term for the session
    pub matching: MatchSettings,
    /// Whole lines or split tokens as match candidates
    pub candidate_policy: CandidatePolicy,
    /// Whether images are binarized before recognition
    pub preprocess: bool,
    /// When the session is written back to storage
    pub persist_policy: PersistPolicy,
    /// Text committed for items that yielded no candidate
    pub failure_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matching: MatchSettings::default(),
            candidate_policy: CandidatePolicy::default(),
            preprocess: true,
            persist_policy: PersistPolicy::default(),
            failure_marker: DEFAULT_FAILURE_MARKER.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration
    pub fn validate(&self) -> AppResult<()> {
        // An empty marker would leave failed slots empty and re-allocatable
        if self.failure_marker.is_empty() {
            return Err(AppError::Config(
                "Failure marker cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Storage configuration
    pub store: StoreConfig,
    /// Batch pipeline configuration
    pub pipeline: PipelineConfig,
    /// OCR engine configuration
    pub ocr: OcrConfig,
    /// Logging configuration
    pub observability: ObservabilityConfig,
    /// Language of status messages (`ja` or `en`)
    pub language: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            pipeline: PipelineConfig::default(),
            ocr: OcrConfig::default(),
            observability: ObservabilityConfig::default(),
            language: "ja".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut store = StoreConfig::default();
        if let Ok(dir) = env::var("KEEPER_DATA_DIR") {
            store.data_dir = PathBuf::from(dir);
        }
        if let Ok(key) = env::var("KEEPER_STORAGE_KEY") {
            store.storage_key = key;
        }
        store.capacity.max_pages = parse_env("KEEPER_MAX_PAGES", store.capacity.max_pages)?;
        store.capacity.slots_per_page =
            parse_env("KEEPER_SLOTS_PER_PAGE", store.capacity.slots_per_page)?;

        let mut pipeline = PipelineConfig::default();
        if let Ok(mode) = env::var("KEEPER_MATCH_MODE") {
            pipeline.matching.mode = MatchMode::parse(&mode);
        }
        if let Ok(term) = env::var("KEEPER_MATCH_TERM") {
            pipeline.matching.term = term;
        }
        if let Ok(policy) = env::var("KEEPER_CANDIDATES") {
            pipeline.candidate_policy = CandidatePolicy::parse(&policy).ok_or_else(|| {
                AppError::Config(format!(
                    "KEEPER_CANDIDATES must be 'tokens' or 'lines', got '{}'",
                    policy
                ))
            })?;
        }
        pipeline.preprocess = parse_env("KEEPER_PREPROCESS", pipeline.preprocess)?;
        if let Ok(policy) = env::var("KEEPER_PERSIST_POLICY") {
            pipeline.persist_policy = PersistPolicy::parse(&policy).ok_or_else(|| {
                AppError::Config(format!(
                    "KEEPER_PERSIST_POLICY must be 'batch' or 'item', got '{}'",
                    policy
                ))
            })?;
        }
        if let Ok(marker) = env::var("KEEPER_FAILURE_MARKER") {
            pipeline.failure_marker = marker;
        }

        let config = Self {
            store,
            pipeline,
            ocr: OcrConfig::from_env()?,
            observability: ObservabilityConfig::from_env(),
            language: env::var("KEEPER_LANGUAGE").unwrap_or_else(|_| "ja".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> AppResult<()> {
        self.store.validate()?;
        self.pipeline.validate()?;
        self.ocr.validate()?;
        self.observability
            .validate()
            .map_err(AppError::Config)?;

        if !crate::localization::SUPPORTED_LANGUAGES.contains(&self.language.as_str()) {
            return Err(AppError::Config(format!(
                "Unsupported language '{}' (supported: {})",
                self.language,
                crate::localization::SUPPORTED_LANGUAGES.join(", ")
            )));
        }

        Ok(())
    }
}

/// Parse an optional environment variable, keeping `default` when it is unset
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.language, "ja");
        assert_eq!(config.store.storage_key, "photo-ocr-keeper-v2");
        assert_eq!(config.store.capacity.max_slots(), 200);
        assert_eq!(config.pipeline.failure_marker, "読み取れませんでした");
    }

    #[test]
    fn test_store_config_rejects_bad_values() {
        let mut store = StoreConfig::default();
        store.storage_key = "../escape".to_string();
        assert!(store.validate().is_err());

        let mut store = StoreConfig::default();
        store.capacity.max_pages = 0;
        assert!(store.validate().is_err());

        let mut store = StoreConfig::default();
        store.capacity.slots_per_page = 0;
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_pipeline_config_rejects_empty_marker() {
        let pipeline = PipelineConfig {
            failure_marker: String::new(),
            ..Default::default()
        };
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_unsupported_language_is_rejected() {
        let config = AppConfig {
            language: "de".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
