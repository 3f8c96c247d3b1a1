//! # Storage Tests
//!
//! Round trips through the on-disk JSON store and recovery from bad files.

use photo_ocr_keeper::queue::{PendingImage, PendingQueue};
use photo_ocr_keeper::slots::{Capacity, SlotStore};
use photo_ocr_keeper::storage::{self, JsonFileStore, StateStore};

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity() -> Capacity {
        Capacity {
            max_pages: 3,
            slots_per_page: 4,
        }
    }

    /// Test that a saved session comes back unchanged from disk
    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "photo-ocr-keeper-v2");

        let mut slots = SlotStore::new(capacity());
        slots.ensure_capacity(5);
        let target = slots.empty_slots()[4];
        slots.commit(target, "品番A-100").unwrap();
        slots.record_copy(target.page_id, target.slot_index).unwrap();
        slots.select_page(2).unwrap();

        let mut queue = PendingQueue::new(capacity().max_slots());
        queue.enqueue(vec![PendingImage::new("q.jpg", "image/jpeg", vec![0xFF, 0xD8, 0x00])]);

        storage::save_session(&store, &slots, &queue).unwrap();
        assert!(store.path().ends_with("photo-ocr-keeper-v2.json"));

        let (restored_slots, restored_queue) = storage::load_session(&store, capacity());
        assert_eq!(restored_slots, slots);
        assert_eq!(restored_slots.current_page_id(), 2);
        assert_eq!(restored_queue.size(), 1);

        let image = restored_queue.iter().next().unwrap();
        assert_eq!(image.name, "q.jpg");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, vec![0xFF, 0xD8, 0x00]);
    }

    /// Test that writes replace the previous document and leave no temp files behind
    #[test]
    fn test_file_store_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"), "session");

        store.write("{\"first\":true}").unwrap();
        store.write("{\"second\":true}").unwrap();

        assert_eq!(store.read().unwrap().as_deref(), Some("{\"second\":true}"));
        let entries = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    /// Test that a missing file reads as nothing stored
    #[test]
    fn test_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "absent");
        assert_eq!(store.read().unwrap(), None);

        let (slots, queue) = storage::load_session(&store, capacity());
        assert_eq!(slots, SlotStore::new(capacity()));
        assert!(queue.is_empty());
    }

    /// Test that a corrupt file yields a fresh session
    #[test]
    fn test_corrupt_file_yields_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "session");
        std::fs::write(store.path(), "{ this is not json").unwrap();

        let (slots, queue) = storage::load_session(&store, capacity());
        assert_eq!(slots.pages().len(), 1);
        assert_eq!(slots.occupied_count(), 0);
        assert!(queue.is_empty());
    }

    /// Test that documents written with other slot counts are normalized
    #[test]
    fn test_restore_normalizes_slot_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "session");
        let document = r#"{
            "pages": [
                {"id": 1, "slots": [{"text": "A", "confirmed": true}]},
                {"id": 4, "slots": [
                    {"text": "", "confirmed": false},
                    {"text": "", "confirmed": false},
                    {"text": "", "confirmed": false},
                    {"text": "", "confirmed": false},
                    {"text": "", "confirmed": false},
                    {"text": "", "confirmed": false}
                ]}
            ],
            "currentPage": 9
        }"#;
        std::fs::write(store.path(), document).unwrap();

        let (mut slots, queue) = storage::load_session(&store, capacity());
        assert!(slots.pages().iter().all(|page| page.slots.len() == 4));
        assert_eq!(slots.pages()[0].slots[0].text, "A");
        // Dangling current page falls back to the first page
        assert_eq!(slots.current_page_id(), 1);
        assert!(queue.is_empty());

        // New pages continue after the highest id
        slots.ensure_capacity(slots.empty_slots().len() + 4);
        assert_eq!(slots.pages().last().unwrap().id, 5);
    }
}
