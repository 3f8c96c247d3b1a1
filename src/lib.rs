//! # Photo OCR Keeper
//!
//! Queues photographs of small documents, runs OCR over them in batches and
//! keeps one selected line of text per photo in a paged grid of slots. The
//! grid and the queue survive restarts through a single JSON document.

pub mod cli;
pub mod config;
pub mod errors;
pub mod image_source;
pub mod instance_manager;
pub mod localization;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod queue;
pub mod slots;
pub mod storage;
pub mod text_processing;

// Re-export types for easier access
pub use ocr::{OcrEngine, TesseractEngine, TextExtractor};
pub use pipeline::{BatchError, BatchReport, Orchestrator, ProgressUpdate, Session};
pub use queue::{PendingImage, PendingQueue};
pub use slots::{Capacity, Slot, SlotStore};
pub use text_processing::{CandidateSplitter, MatchMode, MatchSettings};
