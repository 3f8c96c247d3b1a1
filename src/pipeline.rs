//! # Pipeline Orchestrator
//!
//! Owns the session (slot grid plus pending queue) and drives batch runs:
//!
//! ```text
//! Idle -> Sizing -> Running(i) -> Done -> Idle
//! ```
//!
//! - **Idle**: an empty queue is rejected, nothing changes
//! - **Sizing**: pages are appended for the queued images, targets are the
//!   empty slots in page order; no targets means no room and the queue stays
//! - **Running**: `min(targets, queued)` images are drained up front and
//!   processed one at a time: preprocess, extract, commit
//! - **Done**: the session is persisted and the committed count reported
//!
//! A failing item is committed with the failure marker and the run moves on.
//! Only one run may be active; a second start is rejected, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};

use crate::config::{AppConfig, PipelineConfig};
use crate::errors::{error_logging, AppResult};
use crate::localization::Status;
use crate::observability;
use crate::ocr::{progress_percent, OcrEngine, ProgressFn, TextExtractor};
use crate::preprocessing::{self, ImageScaler};
use crate::queue::{EnqueueReport, PendingImage, PendingQueue};
use crate::slots::{Capacity, PageDeletion, SlotError, SlotStore, SlotTarget};
use crate::storage::{self, JsonFileStore, StateStore, StorageError};
use crate::text_processing::{CandidateSplitter, MatchSettings};

/// When the session is written back during a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistPolicy {
    /// Once, after the last item
    #[default]
    PerBatch,
    /// After every committed item, and once more at the end
    PerItem,
}

impl PersistPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "batch" => Some(PersistPolicy::PerBatch),
            "item" => Some(PersistPolicy::PerItem),
            _ => None,
        }
    }
}

/// Slot grid and pending queue, persisted together
#[derive(Debug, Clone)]
pub struct Session {
    pub slots: SlotStore,
    pub queue: PendingQueue,
}

impl Session {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            slots: SlotStore::new(capacity),
            queue: PendingQueue::new(capacity.max_slots()),
        }
    }

    /// Load from `store`; missing or corrupt data gives a fresh session
    pub fn restore(store: &dyn StateStore, capacity: Capacity) -> Self {
        let (slots, queue) = storage::load_session(store, capacity);
        Self { slots, queue }
    }
}

/// What a progress update is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressLabel {
    /// Item `name` is being loaded and recognized
    Reading { name: String },
    /// All items are committed
    Complete,
}

impl ProgressLabel {
    pub fn status(&self) -> Status {
        match self {
            ProgressLabel::Reading { name } => Status::Reading { name: name.clone() },
            ProgressLabel::Complete => Status::Complete,
        }
    }
}

/// Batch progress as sent over the progress channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub label: ProgressLabel,
    /// Items finished so far
    pub completed: usize,
    pub total: usize,
    /// Batch-relative percentage, `0..=100`
    pub percent: u8,
}

/// Summary of a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Slots committed, failures included
    pub completed: usize,
    /// Slots committed with the failure marker
    pub failed: usize,
    pub pages_created: usize,
    /// Images still queued because the page cap was reached
    pub remaining: usize,
}

impl BatchReport {
    pub fn status(&self) -> Status {
        Status::BatchSaved {
            count: self.completed,
        }
    }
}

/// Reasons a batch did not run to completion
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// Another batch is in progress
    AlreadyRunning,
    /// Nothing is queued
    EmptyQueue,
    /// Page cap reached and every slot is occupied
    NoRoom,
    /// Items were committed in memory but the session could not be written
    Persistence(StorageError),
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::AlreadyRunning => write!(f, "[BATCH_BUSY] A batch is already running"),
            BatchError::EmptyQueue => write!(f, "[BATCH_EMPTY] No images are queued"),
            BatchError::NoRoom => write!(f, "[BATCH_NO_ROOM] No empty slots are left"),
            BatchError::Persistence(e) => write!(f, "[BATCH_PERSIST] {}", e),
        }
    }
}

impl std::error::Error for BatchError {}

impl From<StorageError> for BatchError {
    fn from(err: StorageError) -> Self {
        BatchError::Persistence(err)
    }
}

impl BatchError {
    pub fn status(&self) -> Status {
        match self {
            BatchError::AlreadyRunning => Status::BatchRunning,
            BatchError::EmptyQueue => Status::SelectImages,
            BatchError::NoRoom => Status::NoRoom,
            BatchError::Persistence(_) => Status::PersistFailed,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            BatchError::AlreadyRunning => "already_running",
            BatchError::EmptyQueue => "empty_queue",
            BatchError::NoRoom => "no_room",
            BatchError::Persistence(_) => "persist_failed",
        }
    }
}

/// Holds the running flag for the lifetime of one batch
struct BatchGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> BatchGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Result of a copy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub status: Status,
    /// Text for the clipboard, `None` for an empty slot
    pub text: Option<String>,
}

/// Coordinates queue, preprocessor, extractor and slot store
pub struct Orchestrator {
    session: Mutex<Session>,
    store: Arc<dyn StateStore>,
    extractor: TextExtractor,
    matching: RwLock<MatchSettings>,
    config: PipelineConfig,
    scaler: ImageScaler,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        session: Session,
        store: Arc<dyn StateStore>,
        extractor: TextExtractor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            store,
            extractor,
            matching: RwLock::new(config.matching.clone()),
            config,
            scaler: ImageScaler::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Restore the session from the configured data directory and wire up `engine`
    pub fn from_config(config: &AppConfig, engine: Arc<dyn OcrEngine>) -> Self {
        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(
            config.store.data_dir.clone(),
            config.store.storage_key.clone(),
        ));
        let session = Session::restore(store.as_ref(), config.store.capacity);
        let extractor = TextExtractor::new(
            engine,
            CandidateSplitter::new(config.pipeline.candidate_policy),
            std::time::Duration::from_secs(config.ocr.operation_timeout_secs),
        );
        Self::new(session, store, extractor, config.pipeline.clone())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn match_settings(&self) -> MatchSettings {
        self.matching.read().clone()
    }

    /// Match mode and term used by the next batch
    pub fn set_match_settings(&self, settings: MatchSettings) {
        *self.matching.write() = settings;
    }

    /// Copy of the current session for display
    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Queue images; the maximal prefix that fits is kept
    pub async fn enqueue(&self, images: Vec<PendingImage>) -> AppResult<(EnqueueReport, Status)> {
        let mut session = self.session.lock().await;
        let capacity = session.queue.capacity();
        let offered = images.len();

        if offered > 0 && session.queue.remaining() == 0 {
            return Ok((
                EnqueueReport {
                    accepted: 0,
                    rejected: offered,
                },
                Status::QueueFull { capacity },
            ));
        }

        let report = session.queue.enqueue(images);
        self.persist(&session).await?;

        let status = if report.rejected > 0 {
            Status::ImagesPartiallyAdded {
                rejected: report.rejected,
                capacity,
            }
        } else {
            Status::ImagesAdded {
                count: report.accepted,
            }
        };
        Ok((report, status))
    }

    /// Show the page at 1-based `position`
    pub async fn select_page(&self, position: usize) -> AppResult<Status> {
        let mut session = self.session.lock().await;
        let page_id = match position
            .checked_sub(1)
            .and_then(|index| session.slots.pages().get(index))
        {
            Some(page) => page.id,
            None => return Ok(Status::UnknownPage { page: position }),
        };

        session.slots.select_page(page_id)?;
        self.persist(&session).await?;
        Ok(Status::PageSelected { page: position })
    }

    /// Unlock a slot; `None` addresses the current page
    pub async fn begin_edit(&self, page_id: Option<u32>, slot_index: usize) -> AppResult<Status> {
        let mut session = self.session.lock().await;
        let page_id = page_id.unwrap_or_else(|| session.slots.current_page_id());
        session.slots.begin_edit(page_id, slot_index)?;
        self.persist(&session).await?;
        Ok(Status::Editing {
            slot: slot_index + 1,
        })
    }

    /// Replace a slot's text and lock it
    pub async fn confirm_edit(
        &self,
        page_id: Option<u32>,
        slot_index: usize,
        text: &str,
    ) -> AppResult<Status> {
        let mut session = self.session.lock().await;
        let page_id = page_id.unwrap_or_else(|| session.slots.current_page_id());
        session.slots.confirm_edit(page_id, slot_index, text)?;
        self.persist(&session).await?;
        Ok(Status::EditConfirmed {
            slot: slot_index + 1,
        })
    }

    /// Record a copy and hand back the slot text
    pub async fn record_copy(&self, page_id: Option<u32>, slot_index: usize) -> AppResult<CopyOutcome> {
        let mut session = self.session.lock().await;
        let page_id = page_id.unwrap_or_else(|| session.slots.current_page_id());
        let slot = slot_index + 1;

        match session.slots.record_copy(page_id, slot_index) {
            Ok(text) => {
                self.persist(&session).await?;
                Ok(CopyOutcome {
                    status: Status::Copied { slot },
                    text: Some(text),
                })
            }
            Err(SlotError::EmptySlot { .. }) => Ok(CopyOutcome {
                status: Status::SlotEmpty { slot },
                text: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the current page, or clear it when it is the last one
    pub async fn delete_current_page(&self) -> AppResult<Status> {
        let mut session = self.session.lock().await;
        let deletion = session.slots.delete_current_page();
        self.persist(&session).await?;
        Ok(match deletion {
            PageDeletion::ResetLastPage { .. } => Status::LastPageReset,
            PageDeletion::Removed { .. } => Status::PageDeleted,
        })
    }

    pub async fn queue_status(&self) -> Status {
        Status::QueueWaiting {
            count: self.session.lock().await.queue.size(),
        }
    }

    /// Run one batch over the pending queue.
    ///
    /// Progress is sent on `progress` when given; a dropped receiver is ignored.
    pub async fn process_batch(
        &self,
        progress: Option<UnboundedSender<ProgressUpdate>>,
    ) -> Result<BatchReport, BatchError> {
        let start_time = Instant::now();
        let result = match BatchGuard::acquire(&self.running) {
            Some(_guard) => self.run_batch(progress).await,
            None => Err(BatchError::AlreadyRunning),
        };

        match &result {
            Ok(report) => observability::record_batch_metrics(
                "completed",
                report.completed,
                report.failed,
                start_time.elapsed(),
            ),
            Err(e) => {
                info!(error = %e, "Batch not run");
                observability::record_batch_metrics(e.outcome(), 0, 0, start_time.elapsed());
            }
        }
        result
    }

    async fn run_batch(
        &self,
        progress: Option<UnboundedSender<ProgressUpdate>>,
    ) -> Result<BatchReport, BatchError> {
        let mut session = self.session.lock().await;

        if session.queue.is_empty() {
            return Err(BatchError::EmptyQueue);
        }

        // Sizing
        let queued = session.queue.size();
        let empty = session.slots.empty_slots().len();
        let pages_created = session.slots.ensure_capacity(empty + queued);
        observability::record_pages_created(pages_created);

        let targets = session.slots.empty_slots();
        if targets.is_empty() {
            return Err(BatchError::NoRoom);
        }

        // Running
        let total = targets.len().min(queued);
        let jobs = session.queue.drain(total);
        let settings = self.match_settings();
        let span = observability::batch_span(queued, targets.len());

        let failed = async {
            info!(total, pages_created, "Batch started");
            let mut failed = 0;

            for (index, (image, target)) in jobs.into_iter().zip(targets).enumerate() {
                let name = image.name.clone();
                send_progress(
                    &progress,
                    ProgressLabel::Reading { name: name.clone() },
                    index,
                    total,
                    progress_percent(index, 0.0, total),
                );

                let text = self.process_item(image, &settings, &progress, index, total).await;
                if self.commit(&mut session.slots, target, &text) {
                    failed += 1;
                }

                if self.config.persist_policy == PersistPolicy::PerItem {
                    // The final write still reports failure to the caller
                    if let Err(e) = self.persist(&session).await {
                        warn!(error = %e, item = index, "Per-item persist failed");
                    }
                }

                send_progress(
                    &progress,
                    ProgressLabel::Reading { name },
                    index + 1,
                    total,
                    progress_percent(index + 1, 0.0, total),
                );
            }

            failed
        }
        .instrument(span)
        .await;

        // Done
        send_progress(&progress, ProgressLabel::Complete, total, total, 100);
        self.persist(&session).await?;

        let report = BatchReport {
            completed: total,
            failed,
            pages_created,
            remaining: session.queue.size(),
        };
        info!(
            completed = report.completed,
            failed = report.failed,
            remaining = report.remaining,
            "Batch finished"
        );
        Ok(report)
    }

    /// Preprocess and extract one image; empty means no candidate
    async fn process_item(
        &self,
        image: PendingImage,
        settings: &MatchSettings,
        progress: &Option<UnboundedSender<ProgressUpdate>>,
        index: usize,
        total: usize,
    ) -> String {
        let name = image.name.clone();

        let bytes = if self.config.preprocess {
            let size = image.size();
            let scaler = self.scaler.clone();
            let raw = image.bytes;
            let task =
                tokio::task::spawn_blocking(move || preprocessing::preprocess(&raw, &scaler));
            match task.await {
                Ok(Ok(prepared)) => {
                    debug!(image_name = %name, dimensions = ?prepared.dimensions, "Preprocessed");
                    prepared.png
                }
                Ok(Err(e)) => {
                    error_logging::log_preprocessing_error(&e, &name, size);
                    observability::record_error_metrics("preprocess", "pipeline");
                    return String::new();
                }
                Err(join_error) => {
                    error_logging::log_preprocessing_error(&join_error, &name, size);
                    observability::record_error_metrics("preprocess_task", "pipeline");
                    return String::new();
                }
            }
        } else {
            image.bytes
        };

        let sink: Arc<ProgressFn> = match progress.clone() {
            Some(sender) => {
                let label_name = name.clone();
                Arc::new(move |fraction: f32| {
                    let _ = sender.send(ProgressUpdate {
                        label: ProgressLabel::Reading {
                            name: label_name.clone(),
                        },
                        completed: index,
                        total,
                        percent: progress_percent(index, fraction, total),
                    });
                })
            }
            None => Arc::new(|_: f32| {}),
        };

        self.extractor.extract(&name, bytes, settings, sink).await
    }

    /// Commit `text`, or the failure marker when it is empty. Returns true for a failure.
    fn commit(&self, slots: &mut SlotStore, target: SlotTarget, text: &str) -> bool {
        let ocr_failed = text.is_empty();
        let result = if ocr_failed {
            slots.commit_failure(target, &self.config.failure_marker)
        } else {
            slots.commit(target, text)
        };

        // Targets come from the same store under the same lock
        if let Err(e) = result {
            warn!(error = %e, page_id = target.page_id, slot = target.slot_index, "Commit target vanished");
        }
        observability::record_slot_commit(ocr_failed);
        ocr_failed
    }

    /// Serialize under the session lock, write on the blocking pool
    async fn persist(&self, session: &Session) -> Result<(), StorageError> {
        let start_time = Instant::now();
        let key = self.store.key().to_string();
        let json = storage::encode_session(&session.slots, &session.queue)?;
        let store = Arc::clone(&self.store);

        let result = tokio::task::spawn_blocking(move || store.write(&json))
            .instrument(observability::storage_span("write", &key))
            .await
            .unwrap_or_else(|join_error| {
                Err(StorageError::Io {
                    key: key.clone(),
                    message: join_error.to_string(),
                })
            });

        observability::record_persist_metrics("write", result.is_ok(), start_time.elapsed());
        if let Err(e) = &result {
            error_logging::log_storage_error(e, "write", &key);
        }
        result
    }
}

fn send_progress(
    progress: &Option<UnboundedSender<ProgressUpdate>>,
    label: ProgressLabel,
    completed: usize,
    total: usize,
    percent: u8,
) {
    if let Some(sender) = progress {
        let _ = sender.send(ProgressUpdate {
            label,
            completed,
            total,
            percent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_policy_parse() {
        assert_eq!(PersistPolicy::parse("batch"), Some(PersistPolicy::PerBatch));
        assert_eq!(PersistPolicy::parse(" ITEM "), Some(PersistPolicy::PerItem));
        assert_eq!(PersistPolicy::parse("never"), None);
        assert_eq!(PersistPolicy::default(), PersistPolicy::PerBatch);
    }

    #[test]
    fn test_batch_guard_is_exclusive() {
        let running = AtomicBool::new(false);
        let guard = BatchGuard::acquire(&running);
        assert!(guard.is_some());
        assert!(BatchGuard::acquire(&running).is_none());
        drop(guard);
        assert!(BatchGuard::acquire(&running).is_some());
    }

    #[test]
    fn test_batch_error_statuses() {
        assert_eq!(BatchError::EmptyQueue.status(), Status::SelectImages);
        assert_eq!(BatchError::NoRoom.status(), Status::NoRoom);
        assert_eq!(BatchError::AlreadyRunning.status(), Status::BatchRunning);
    }
}
