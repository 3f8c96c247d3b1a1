//! # Durable Storage
//!
//! The whole session (page grid, current page and pending images) is stored
//! as one JSON document under a fixed versioned key. Reads never fail the
//! caller: anything missing or unreadable yields a freshly seeded session.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::error_logging;
use crate::queue::{PendingImage, PendingQueue};
use crate::slots::{Capacity, Page, SlotStore};

/// Errors raised by a [`StateStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Underlying read or write failed
    Io { key: String, message: String },
    /// The session could not be turned into JSON
    Serialize(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { key, message } => write!(f, "[STORAGE_IO] {}: {}", key, message),
            StorageError::Serialize(msg) => write!(f, "[STORAGE_SERIALIZE] {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Key/value boundary for the persisted session
pub trait StateStore: Send + Sync {
    /// Key the session is stored under
    fn key(&self) -> &str;

    /// Raw stored value, `None` when nothing was ever written
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored value
    fn write(&self, value: &str) -> Result<(), StorageError>;
}

/// Stores the session as `<dir>/<key>.json`, replacing it atomically
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    key: String,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn io_error(&self, err: impl fmt::Display) -> StorageError {
        StorageError::Io {
            key: self.key.clone(),
            message: err.to_string(),
        }
    }
}

impl StateStore for JsonFileStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn read(&self) -> Result<Option<String>, StorageError> {
        let path = self.path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| self.io_error(e))?;

        // Temp file in the same directory so the rename stays on one filesystem
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| self.io_error(e))?;
        temp.write_all(value.as_bytes())
            .map_err(|e| self.io_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        temp.persist(self.path()).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path().display(), bytes = value.len(), "Session written");
        Ok(())
    }
}

/// In-process store, used by tests and embedders without a filesystem
#[derive(Debug, Default)]
pub struct MemoryStore {
    key: String,
    value: Mutex<Option<String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Store pre-populated with `value`
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new(key);
        *store.value.lock() = Some(value.into());
        store
    }

    /// Current stored value
    pub fn contents(&self) -> Option<String> {
        self.value.lock().clone()
    }

    /// Make every following write fail, to exercise persistence errors
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

impl StateStore for MemoryStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.value.lock().clone())
    }

    fn write(&self, value: &str) -> Result<(), StorageError> {
        if *self.fail_writes.lock() {
            return Err(StorageError::Io {
                key: self.key.clone(),
                message: "write rejected".to_string(),
            });
        }
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }
}

/// A pending image as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedImage {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 encoded image bytes
    pub data: String,
}

/// The JSON document written under the storage key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub pages: Vec<Page>,
    pub current_page: u32,
    #[serde(default)]
    pub pending_files: Vec<PersistedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Snapshot the in-memory session
    pub fn capture(slots: &SlotStore, queue: &PendingQueue) -> Self {
        Self {
            pages: slots.pages().to_vec(),
            current_page: slots.current_page_id(),
            pending_files: queue
                .iter()
                .map(|image| PersistedImage {
                    name: image.name.clone(),
                    mime_type: image.mime_type.clone(),
                    data: STANDARD.encode(&image.bytes),
                })
                .collect(),
            saved_at: Some(Utc::now()),
        }
    }

    /// Rebuild the slot grid and queue, repairing invariants on the way
    pub fn into_parts(self, capacity: Capacity) -> (SlotStore, PendingQueue) {
        let slots = SlotStore::from_parts(self.pages, self.current_page, capacity);

        let images = self
            .pending_files
            .into_iter()
            .filter_map(|file| match STANDARD.decode(file.data.as_bytes()) {
                Ok(bytes) => Some(PendingImage::new(file.name, file.mime_type, bytes)),
                Err(e) => {
                    warn!(name = %file.name, error = %e, "Dropping pending image with invalid data");
                    None
                }
            })
            .collect();

        (slots, PendingQueue::from_items(images, capacity.max_slots()))
    }
}

/// Load the session, falling back to a fresh one on missing or corrupt data
pub fn load_session(store: &dyn StateStore, capacity: Capacity) -> (SlotStore, PendingQueue) {
    let fresh = || (SlotStore::new(capacity), PendingQueue::new(capacity.max_slots()));

    let raw = match store.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!(key = store.key(), "No saved session, starting fresh");
            return fresh();
        }
        Err(e) => {
            error_logging::log_storage_error(&e, "read", store.key());
            return fresh();
        }
    };

    match serde_json::from_str::<PersistedSession>(&raw) {
        Ok(session) => {
            debug!(
                key = store.key(),
                pages = session.pages.len(),
                pending = session.pending_files.len(),
                "Session restored"
            );
            session.into_parts(capacity)
        }
        Err(e) => {
            warn!(key = store.key(), error = %e, "Saved session is malformed, starting fresh");
            fresh()
        }
    }
}

/// Serialize the whole session to the stored JSON form
pub fn encode_session(slots: &SlotStore, queue: &PendingQueue) -> Result<String, StorageError> {
    let document = PersistedSession::capture(slots, queue);
    serde_json::to_string(&document).map_err(|e| StorageError::Serialize(e.to_string()))
}

/// Serialize and write the whole session
pub fn save_session(
    store: &dyn StateStore,
    slots: &SlotStore,
    queue: &PendingQueue,
) -> Result<(), StorageError> {
    store.write(&encode_session(slots, queue)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::SlotTarget;

    fn capacity() -> Capacity {
        Capacity {
            max_pages: 2,
            slots_per_page: 3,
        }
    }

    #[test]
    fn test_missing_value_yields_fresh_session() {
        let store = MemoryStore::new("k");
        let (slots, queue) = load_session(&store, capacity());
        assert_eq!(slots.pages().len(), 1);
        assert_eq!(slots.current_page_id(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_malformed_value_yields_fresh_session() {
        let store = MemoryStore::with_value("k", "{not json");
        let (slots, queue) = load_session(&store, capacity());
        assert_eq!(slots, SlotStore::new(capacity()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_session_survives_save_and_load() {
        let store = MemoryStore::new("k");
        let mut slots = SlotStore::new(capacity());
        let mut queue = PendingQueue::new(capacity().max_slots());
        slots
            .commit(
                SlotTarget {
                    page_id: 1,
                    page_index: 0,
                    slot_index: 1,
                },
                "ABC",
            )
            .unwrap();
        queue.enqueue(vec![PendingImage::new("a.png", "image/png", vec![1, 2, 3])]);

        save_session(&store, &slots, &queue).unwrap();
        let (restored_slots, restored_queue) = load_session(&store, capacity());

        assert_eq!(restored_slots, slots);
        let images: Vec<PendingImage> = restored_queue.iter().cloned().collect();
        assert_eq!(images, vec![PendingImage::new("a.png", "image/png", vec![1, 2, 3])]);
    }

    #[test]
    fn test_document_field_names() {
        let store = MemoryStore::new("k");
        let slots = SlotStore::new(capacity());
        let mut queue = PendingQueue::new(6);
        queue.enqueue(vec![PendingImage::new("a.png", "image/png", vec![0])]);
        save_session(&store, &slots, &queue).unwrap();

        let value: serde_json::Value = serde_json::from_str(&store.contents().unwrap()).unwrap();
        assert_eq!(value["currentPage"], 1);
        assert_eq!(value["pages"][0]["slots"][0]["ocrFailed"], false);
        assert!(value["pages"][0]["slots"][0]["copyHistory"].is_array());
        assert_eq!(value["pendingFiles"][0]["type"], "image/png");
        assert_eq!(value["pendingFiles"][0]["data"], "AA==");
    }

    #[test]
    fn test_failed_write_is_reported() {
        let store = MemoryStore::new("k");
        store.set_fail_writes(true);
        let result = save_session(
            &store,
            &SlotStore::new(capacity()),
            &PendingQueue::new(6),
        );
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }
}
