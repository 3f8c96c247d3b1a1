//! # OCR Processing Module
//!
//! The engine boundary and the text extractor built on top of it.
//!
//! - [`OcrEngine`]: synchronous recognizer, `image bytes -> raw text`
//! - [`TesseractEngine`]: production engine backed by a cached leptess instance
//! - [`TextExtractor`]: runs an engine on the blocking pool under a timeout,
//!   forwards progress and reduces the raw text to a single candidate
//!
//! The extractor never fails: engine errors, panics and timeouts are logged
//! and reported as an empty result, which the pipeline commits as a failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn, Instrument};

use crate::errors::error_logging;
use crate::instance_manager::OcrInstanceManager;
use crate::observability;
use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;
use crate::text_processing::{CandidateSplitter, MatchSettings};

/// Progress sink receiving the engine's completion fraction in `[0, 1]`
pub type ProgressFn = dyn Fn(f32) + Send + Sync;

/// A text recognizer. Implementations block; callers run them off the async runtime.
pub trait OcrEngine: Send + Sync {
    /// Recognize all text in an encoded image
    fn recognize(&self, image: &[u8], progress: &ProgressFn) -> Result<String, OcrError>;
}

/// Tesseract through leptess, one shared instance per language/model
pub struct TesseractEngine {
    config: OcrConfig,
    instances: Arc<OcrInstanceManager>,
}

impl TesseractEngine {
    pub fn new(config: OcrConfig) -> Self {
        Self::with_manager(config, Arc::new(OcrInstanceManager::new()))
    }

    pub fn with_manager(config: OcrConfig, instances: Arc<OcrInstanceManager>) -> Self {
        Self { config, instances }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &[u8], progress: &ProgressFn) -> Result<String, OcrError> {
        // leptess exposes no progress monitor, only start and end are reported
        progress(0.0);

        let instance = self.instances.get_instance(&self.config)?;
        let text = {
            let mut tess = instance.lock();
            tess.set_image_from_mem(image).map_err(|e| {
                OcrError::ImageLoad(format!("Failed to load image for OCR: {e}"))
            })?;
            tess.get_utf8_text().map_err(|e| {
                OcrError::Extraction(format!("Failed to extract text from image: {e}"))
            })?
        };

        progress(1.0);
        Ok(text)
    }
}

/// Overall batch percentage while item `index` of `total` is `fraction` done
///
/// `round((index + fraction) / total * 100)`, clamped to `[0, 100]`.
pub fn progress_percent(index: usize, fraction: f32, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let percent = ((index as f64 + fraction as f64) / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Engine call plus candidate selection
#[derive(Clone)]
pub struct TextExtractor {
    engine: Arc<dyn OcrEngine>,
    splitter: CandidateSplitter,
    timeout: Duration,
}

impl TextExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, splitter: CandidateSplitter, timeout: Duration) -> Self {
        Self {
            engine,
            splitter,
            timeout,
        }
    }

    pub fn splitter(&self) -> &CandidateSplitter {
        &self.splitter
    }

    /// Run the engine on the blocking pool, bounded by the configured timeout
    ///
    /// On timeout the progress sink is cut off and the engine call is still
    /// awaited before returning, so the next recognition never overlaps it.
    pub async fn recognize(
        &self,
        image: Vec<u8>,
        progress: Arc<ProgressFn>,
    ) -> Result<String, OcrError> {
        let engine = Arc::clone(&self.engine);
        let live = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&live);
        let mut task = tokio::task::spawn_blocking(move || {
            let gated = move |fraction: f32| {
                if gate.load(Ordering::Acquire) {
                    progress(fraction);
                }
            };
            engine.recognize(&image, &gated)
        });

        let result = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(OcrError::TaskFailed(join_error.to_string())),
            Err(_) => {
                live.store(false, Ordering::Release);
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "OCR timed out, waiting for the engine call to finish"
                );
                // The blocking thread cannot be interrupted; drain it and drop its result
                let _ = task.await;
                Err(OcrError::Timeout(format!(
                    "OCR operation timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }
        };
        live.store(false, Ordering::Release);
        result
    }

    /// Recognize `image` and select a candidate; empty when nothing usable came back
    pub async fn extract(
        &self,
        name: &str,
        image: Vec<u8>,
        settings: &MatchSettings,
        progress: Arc<ProgressFn>,
    ) -> String {
        let image_size = image.len() as u64;
        let start_time = Instant::now();

        let span = observability::ocr_span("extract", name);
        let result = self.recognize(image, progress).instrument(span).await;
        let duration = start_time.elapsed();

        match result {
            Ok(raw) => {
                observability::record_ocr_metrics(true, duration, image_size);
                let selected = self.splitter.find_match(&raw, settings);
                info!(
                    image_name = %name,
                    duration_ms = duration.as_millis() as u64,
                    raw_chars = raw.chars().count(),
                    selected_chars = selected.chars().count(),
                    "OCR extraction completed"
                );
                debug!(image_name = %name, selected = %selected, "Selected candidate");
                selected
            }
            Err(e) => {
                observability::record_ocr_metrics(false, duration, image_size);
                observability::record_error_metrics("ocr", "text_extractor");
                error_logging::log_ocr_error(
                    &e,
                    "extract",
                    Some(name),
                    Some(image_size),
                    Some(duration),
                );
                warn!(image_name = %name, "Treating OCR failure as no candidate");
                String::new()
            }
        }
    }
}
