//! # OCR Instance Manager Module
//!
//! Keeps one Tesseract instance per language/model combination so batches do
//! not pay the engine start-up cost for every image.

use std::collections::HashMap;
use std::sync::Arc;

use leptess::{LepTess, Variable};
use parking_lot::Mutex;
use tracing::info;

use crate::ocr_config::{ModelType, OcrConfig};
use crate::ocr_errors::OcrError;

/// Shared handle to a configured Tesseract instance
pub type SharedTess = Arc<Mutex<LepTess>>;

/// Thread-safe cache of Tesseract instances keyed by `languages:tessdata_dir`
///
/// Instances are created on first request and live until removed or the
/// manager is dropped. Each instance is guarded by its own mutex; a
/// recognition holds it for the whole `set_image` / `get_utf8_text` pair.
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, SharedTess>>,
}

impl OcrInstanceManager {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn instance_key(languages: &str, model_type: ModelType) -> String {
        format!("{}:{}", languages, model_type.tessdata_dir())
    }

    /// Get or create the instance for `config`
    ///
    /// # Errors
    ///
    /// `OcrError::Initialization` when Tesseract cannot load the requested
    /// languages or rejects a variable.
    pub fn get_instance(&self, config: &OcrConfig) -> Result<SharedTess, OcrError> {
        let key = Self::instance_key(&config.languages, config.model_type);

        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }

        info!(
            languages = %config.languages,
            model = config.model_type.tessdata_dir(),
            "Creating new OCR instance"
        );

        let tessdata_path = Self::get_tessdata_path(config.model_type);
        let mut tess = LepTess::new(tessdata_path.as_deref(), &config.languages).map_err(|e| {
            OcrError::Initialization(format!("Failed to initialize Tesseract: {}", e))
        })?;

        tess.set_variable(Variable::TesseditPagesegMode, config.psm_mode.as_str())
            .map_err(|e| OcrError::Initialization(format!("Failed to set PSM mode: {}", e)))?;

        if config.preserve_interword_spaces {
            tess.set_variable(Variable::PreserveInterwordSpaces, "1")
                .map_err(|e| {
                    OcrError::Initialization(format!(
                        "Failed to enable interword space preservation: {}",
                        e
                    ))
                })?;
        }

        let instance = Arc::new(Mutex::new(tess));

        // Another caller may have raced us here; keep whichever landed first
        let mut instances = self.instances.lock();
        let stored = instances.entry(key).or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(stored))
    }

    /// Find a model-specific tessdata directory, `None` means Tesseract's default
    fn get_tessdata_path(model_type: ModelType) -> Option<String> {
        let dir = model_type.tessdata_dir();
        let possible_paths = [
            format!("/usr/share/tesseract-ocr/5/{}", dir),
            format!("/usr/share/tesseract-ocr/4.00/{}", dir),
            format!("/usr/share/{}", dir),
            format!("/usr/local/share/{}", dir),
            format!("/opt/homebrew/share/{}", dir),
        ];

        for path in possible_paths {
            if std::path::Path::new(&path).exists() {
                info!(path = %path, "Using tessdata path");
                return Some(path);
            }
        }

        info!(
            model = ?model_type,
            "No model-specific tessdata path found, using Tesseract default"
        );
        None
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}
