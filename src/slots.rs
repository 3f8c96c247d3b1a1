//! # Slot Store
//!
//! The durable grid of pages and slots that confirmed OCR results land in.
//!
//! ## Invariants
//!
//! - `pages` is never empty; a fresh state holds page 1
//! - every page holds exactly `slots_per_page` slots
//! - page ids strictly increase in creation order, new id = max id + 1
//! - `current_page` always resolves to an existing page
//! - a slot is empty iff its text is empty; nothing else gates allocation

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Page and slot limits of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Hard cap on the number of pages
    pub max_pages: usize,
    /// Slots in every page
    pub slots_per_page: usize,
}

impl Capacity {
    pub const DEFAULT_MAX_PAGES: usize = 20;
    pub const DEFAULT_SLOTS_PER_PAGE: usize = 10;

    /// Total addressable slots, which is also the pending queue capacity
    pub fn max_slots(&self) -> usize {
        self.max_pages * self.slots_per_page
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            max_pages: Self::DEFAULT_MAX_PAGES,
            slots_per_page: Self::DEFAULT_SLOTS_PER_PAGE,
        }
    }
}

/// One storage location for a single text result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub text: String,
    pub confirmed: bool,
    #[serde(default)]
    pub ocr_failed: bool,
    #[serde(default)]
    pub copy_history: Vec<String>,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Character count shown next to a slot (`12字`)
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn was_copied(&self) -> bool {
        !self.copy_history.is_empty()
    }
}

/// A fixed-size group of slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: u32,
    pub slots: Vec<Slot>,
}

impl Page {
    pub fn new(id: u32, slots_per_page: usize) -> Self {
        Self {
            id,
            slots: vec![Slot::default(); slots_per_page],
        }
    }

    pub fn empty_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_empty()).count()
    }
}

/// Address of one slot, tagged with both the page id and its position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTarget {
    pub page_id: u32,
    pub page_index: usize,
    pub slot_index: usize,
}

/// Errors raised by slot addressing and user edits
#[derive(Debug, Clone, PartialEq)]
pub enum SlotError {
    /// No page with this id
    UnknownPage { page_id: u32 },
    /// Slot index outside the page
    SlotOutOfRange { page_id: u32, slot_index: usize, slots: usize },
    /// Copy requested on a slot without text
    EmptySlot { page_id: u32, slot_index: usize },
}

impl std::fmt::Display for SlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotError::UnknownPage { page_id } => write!(f, "Page {} does not exist", page_id),
            SlotError::SlotOutOfRange { page_id, slot_index, slots } => write!(
                f,
                "Slot {} is out of range for page {} ({} slots)",
                slot_index + 1,
                page_id,
                slots
            ),
            SlotError::EmptySlot { page_id, slot_index } => {
                write!(f, "Slot {} on page {} is empty", slot_index + 1, page_id)
            }
        }
    }
}

impl std::error::Error for SlotError {}

/// Result of a page deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDeletion {
    /// The sole page was wiped in place and kept its id
    ResetLastPage { page_id: u32 },
    /// The page was removed and another page became current
    Removed { page_id: u32, new_current: u32 },
}

/// The page grid plus the current page selection
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStore {
    pages: Vec<Page>,
    current_page: u32,
    capacity: Capacity,
}

impl SlotStore {
    /// A fresh single-page grid
    pub fn new(capacity: Capacity) -> Self {
        Self {
            pages: vec![Page::new(1, capacity.slots_per_page)],
            current_page: 1,
            capacity,
        }
    }

    /// Rebuild a store from persisted parts, repairing anything that breaks an invariant
    pub fn from_parts(mut pages: Vec<Page>, current_page: u32, capacity: Capacity) -> Self {
        if pages.is_empty() {
            return Self::new(capacity);
        }

        for page in &mut pages {
            if page.slots.len() != capacity.slots_per_page {
                warn!(
                    page_id = page.id,
                    found = page.slots.len(),
                    expected = capacity.slots_per_page,
                    "Resizing persisted page to the configured slot count"
                );
                page.slots.resize(capacity.slots_per_page, Slot::default());
            }
        }

        // Ids must stay unique and increasing for page addressing to be unambiguous
        let mut previous = 0;
        for page in &mut pages {
            if page.id <= previous {
                warn!(
                    found = page.id,
                    renumbered = previous + 1,
                    "Renumbering duplicate or out-of-order persisted page"
                );
                page.id = previous + 1;
            }
            previous = page.id;
        }

        if pages.len() > capacity.max_pages {
            warn!(
                pages = pages.len(),
                max_pages = capacity.max_pages,
                "Persisted session holds more pages than the configured cap"
            );
        }

        let mut store = Self {
            pages,
            current_page,
            capacity,
        };
        store.current_page = store.current_page().id;
        store
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn current_page_id(&self) -> u32 {
        self.current_page
    }

    /// The selected page, falling back to the first page when the id dangles
    pub fn current_page(&self) -> &Page {
        self.pages
            .iter()
            .find(|page| page.id == self.current_page)
            .unwrap_or(&self.pages[0])
    }

    pub fn page(&self, page_id: u32) -> Result<&Page, SlotError> {
        self.pages
            .iter()
            .find(|page| page.id == page_id)
            .ok_or(SlotError::UnknownPage { page_id })
    }

    /// Total slots across all pages
    pub fn slot_count(&self) -> usize {
        self.pages.len() * self.capacity.slots_per_page
    }

    /// Slots holding text
    pub fn occupied_count(&self) -> usize {
        self.pages
            .iter()
            .map(|page| page.slots.len() - page.empty_count())
            .sum()
    }

    /// Every empty slot in page order, then slot order; this is the commit order
    pub fn empty_slots(&self) -> Vec<SlotTarget> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(page_index, page)| {
                page.slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_empty())
                    .map(move |(slot_index, _)| SlotTarget {
                        page_id: page.id,
                        page_index,
                        slot_index,
                    })
            })
            .collect()
    }

    /// Append empty pages until `required_empty` slots are free or the page cap is hit.
    ///
    /// Returns the number of pages created. Hitting the cap is not an error;
    /// callers re-query [`SlotStore::empty_slots`] and accept fewer targets.
    pub fn ensure_capacity(&mut self, required_empty: usize) -> usize {
        let mut empty = self.pages.iter().map(Page::empty_count).sum::<usize>();
        let mut created = 0;

        while empty < required_empty && self.pages.len() < self.capacity.max_pages {
            let id = self.next_page_id();
            self.pages.push(Page::new(id, self.capacity.slots_per_page));
            empty += self.capacity.slots_per_page;
            created += 1;
            debug!(page_id = id, "Appended page for pending images");
        }

        if empty < required_empty {
            info!(
                required_empty,
                available = empty,
                max_pages = self.capacity.max_pages,
                "Page cap reached before all pending images could be placed"
            );
        }

        created
    }

    /// Write an extraction result; an empty text marks the slot as failed
    pub fn commit(&mut self, target: SlotTarget, text: &str) -> Result<(), SlotError> {
        let slot = self.slot_mut(target.page_id, target.slot_index)?;
        *slot = Slot {
            text: text.to_string(),
            confirmed: true,
            ocr_failed: text.is_empty(),
            copy_history: Vec::new(),
        };
        Ok(())
    }

    /// Write the failure marker so the slot is occupied but flagged
    pub fn commit_failure(&mut self, target: SlotTarget, marker: &str) -> Result<(), SlotError> {
        let slot = self.slot_mut(target.page_id, target.slot_index)?;
        *slot = Slot {
            text: marker.to_string(),
            confirmed: true,
            ocr_failed: true,
            copy_history: Vec::new(),
        };
        Ok(())
    }

    /// Remove the current page, or wipe it in place when it is the only one.
    ///
    /// Destructive and unconfirmed; there is no undo.
    pub fn delete_current_page(&mut self) -> PageDeletion {
        let current = self.current_page().id;

        if self.pages.len() == 1 {
            self.pages[0] = Page::new(current, self.capacity.slots_per_page);
            self.current_page = current;
            info!(page_id = current, "Reset the last remaining page");
            return PageDeletion::ResetLastPage { page_id: current };
        }

        self.pages.retain(|page| page.id != current);
        self.current_page = self.pages[0].id;
        info!(
            page_id = current,
            new_current = self.current_page,
            "Deleted current page"
        );
        PageDeletion::Removed {
            page_id: current,
            new_current: self.current_page,
        }
    }

    pub fn select_page(&mut self, page_id: u32) -> Result<(), SlotError> {
        self.page(page_id)?;
        self.current_page = page_id;
        Ok(())
    }

    /// Unlock a slot for editing
    pub fn begin_edit(&mut self, page_id: u32, slot_index: usize) -> Result<(), SlotError> {
        self.slot_mut(page_id, slot_index)?.confirmed = false;
        Ok(())
    }

    /// Replace the text of a slot and lock it again
    pub fn confirm_edit(
        &mut self,
        page_id: u32,
        slot_index: usize,
        text: &str,
    ) -> Result<(), SlotError> {
        let slot = self.slot_mut(page_id, slot_index)?;
        slot.text = text.to_string();
        slot.confirmed = true;
        Ok(())
    }

    /// Append the slot's text to its copy history and hand it back for the clipboard
    pub fn record_copy(&mut self, page_id: u32, slot_index: usize) -> Result<String, SlotError> {
        let slot = self.slot_mut(page_id, slot_index)?;
        if slot.is_empty() {
            return Err(SlotError::EmptySlot {
                page_id,
                slot_index,
            });
        }
        slot.copy_history.push(slot.text.clone());
        Ok(slot.text.clone())
    }

    pub fn slot(&self, page_id: u32, slot_index: usize) -> Result<&Slot, SlotError> {
        let page = self.page(page_id)?;
        page.slots.get(slot_index).ok_or(SlotError::SlotOutOfRange {
            page_id,
            slot_index,
            slots: page.slots.len(),
        })
    }

    fn slot_mut(&mut self, page_id: u32, slot_index: usize) -> Result<&mut Slot, SlotError> {
        let page = self
            .pages
            .iter_mut()
            .find(|page| page.id == page_id)
            .ok_or(SlotError::UnknownPage { page_id })?;
        let slots = page.slots.len();
        page.slots.get_mut(slot_index).ok_or(SlotError::SlotOutOfRange {
            page_id,
            slot_index,
            slots,
        })
    }

    fn next_page_id(&self) -> u32 {
        self.pages.iter().map(|page| page.id).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Capacity {
        Capacity {
            max_pages: 3,
            slots_per_page: 2,
        }
    }

    #[test]
    fn test_new_store_is_seeded() {
        let store = SlotStore::new(Capacity::default());
        assert_eq!(store.pages().len(), 1);
        assert_eq!(store.current_page_id(), 1);
        assert_eq!(store.pages()[0].slots.len(), 10);
        assert_eq!(store.empty_slots().len(), 10);
    }

    #[test]
    fn test_empty_slots_order() {
        let mut store = SlotStore::new(small());
        store.ensure_capacity(4);
        store
            .commit(
                SlotTarget {
                    page_id: 1,
                    page_index: 0,
                    slot_index: 0,
                },
                "A",
            )
            .unwrap();

        let targets: Vec<(u32, usize)> = store
            .empty_slots()
            .iter()
            .map(|t| (t.page_id, t.slot_index))
            .collect();
        assert_eq!(targets, vec![(1, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn test_ensure_capacity_stops_at_cap() {
        let mut store = SlotStore::new(small());
        let created = store.ensure_capacity(100);
        assert_eq!(created, 2);
        assert_eq!(store.pages().len(), 3);
        assert_eq!(store.empty_slots().len(), 6);

        // Already satisfied, nothing appended
        assert_eq!(store.ensure_capacity(1), 0);
    }

    #[test]
    fn test_commit_empty_text_marks_failure() {
        let mut store = SlotStore::new(small());
        let target = store.empty_slots()[0];
        store.commit(target, "").unwrap();
        let slot = store.slot(1, 0).unwrap();
        assert!(slot.confirmed);
        assert!(slot.ocr_failed);
    }

    #[test]
    fn test_commit_unknown_page_is_rejected() {
        let mut store = SlotStore::new(small());
        let target = SlotTarget {
            page_id: 9,
            page_index: 0,
            slot_index: 0,
        };
        assert_eq!(
            store.commit(target, "x"),
            Err(SlotError::UnknownPage { page_id: 9 })
        );
    }

    #[test]
    fn test_page_ids_stay_monotonic_after_delete() {
        let mut store = SlotStore::new(small());
        store.ensure_capacity(6);
        store.select_page(3).unwrap();
        store.delete_current_page();
        assert_eq!(store.current_page_id(), 1);

        // Pages 1 and 2 remain; the next page must not reuse an id in use
        store.ensure_capacity(6);
        let ids: Vec<u32> = store.pages().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        store.select_page(1).unwrap();
        store.delete_current_page();
        store.ensure_capacity(6);
        let ids: Vec<u32> = store.pages().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_delete_sole_page_keeps_its_id() {
        let mut store = SlotStore::new(small());
        store.ensure_capacity(4);
        store.delete_current_page();
        assert_eq!(store.pages().len(), 1);
        assert_eq!(store.current_page_id(), 2);

        let target = store.empty_slots()[1];
        store.commit(target, "left behind").unwrap();
        store.record_copy(target.page_id, target.slot_index).unwrap();

        assert_eq!(
            store.delete_current_page(),
            PageDeletion::ResetLastPage { page_id: 2 }
        );
        assert_eq!(store.pages().len(), 1);
        assert_eq!(store.pages()[0].id, 2);
        assert_eq!(store.current_page_id(), 2);
        assert!(store.pages()[0].slots.iter().all(|slot| *slot == Slot::default()));
    }

    #[test]
    fn test_from_parts_renumbers_duplicate_ids() {
        let mut first = Page::new(2, 2);
        first.slots[0].text = "kept".to_string();
        let pages = vec![first, Page::new(2, 2), Page::new(3, 2)];

        let mut store = SlotStore::from_parts(pages, 2, small());
        let ids: Vec<u32> = store.pages().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        // A target on the former duplicate lands on that page, not the first
        let target = store
            .empty_slots()
            .into_iter()
            .find(|target| target.page_index == 1)
            .unwrap();
        store.commit(target, "new").unwrap();
        assert_eq!(store.pages()[0].slots[0].text, "kept");
        assert_eq!(store.pages()[1].slots[0].text, "new");
    }

    #[test]
    fn test_from_parts_repairs_state() {
        let pages = vec![Page {
            id: 4,
            slots: vec![Slot::default(); 1],
        }];
        let store = SlotStore::from_parts(pages, 99, small());
        assert_eq!(store.current_page_id(), 4);
        assert_eq!(store.pages()[0].slots.len(), 2);

        let store = SlotStore::from_parts(Vec::new(), 7, small());
        assert_eq!(store.pages().len(), 1);
        assert_eq!(store.current_page_id(), 1);
    }

    #[test]
    fn test_edit_and_copy_flow() {
        let mut store = SlotStore::new(small());
        assert_eq!(
            store.record_copy(1, 0),
            Err(SlotError::EmptySlot {
                page_id: 1,
                slot_index: 0
            })
        );

        let target = store.empty_slots()[0];
        store.commit(target, "ABC").unwrap();
        store.begin_edit(1, 0).unwrap();
        assert!(!store.slot(1, 0).unwrap().confirmed);

        store.confirm_edit(1, 0, "ABD").unwrap();
        let slot = store.slot(1, 0).unwrap();
        assert!(slot.confirmed);
        assert_eq!(slot.text, "ABD");

        assert_eq!(store.record_copy(1, 0).unwrap(), "ABD");
        assert_eq!(store.record_copy(1, 0).unwrap(), "ABD");
        assert_eq!(store.slot(1, 0).unwrap().copy_history.len(), 2);
        assert!(store.slot(1, 0).unwrap().was_copied());

        assert!(matches!(
            store.begin_edit(1, 5),
            Err(SlotError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn test_select_unknown_page() {
        let mut store = SlotStore::new(small());
        assert_eq!(
            store.select_page(2),
            Err(SlotError::UnknownPage { page_id: 2 })
        );
        assert_eq!(store.current_page_id(), 1);
    }
}
