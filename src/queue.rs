//! # Pending Queue
//!
//! Bounded FIFO of images waiting for a batch run. Admission is best effort:
//! the longest prefix that fits is kept and the remainder is reported back.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, info};

use crate::observability;

/// An image waiting to be processed
#[derive(Clone, PartialEq, Eq)]
pub struct PendingImage {
    /// Display name, usually the file name
    pub name: String,
    /// MIME type such as `image/jpeg`
    pub mime_type: String,
    /// Raw encoded bytes
    pub bytes: Vec<u8>,
}

impl PendingImage {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// Image bytes are large; keep debug output readable
impl fmt::Debug for PendingImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingImage")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Outcome of an enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnqueueReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Bounded holding area drained only by the orchestrator
#[derive(Debug, Clone)]
pub struct PendingQueue {
    items: VecDeque<PendingImage>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Restore a queue from persisted items, dropping anything past capacity
    pub fn from_items(items: Vec<PendingImage>, capacity: usize) -> Self {
        let mut queue = Self::new(capacity);
        let report = queue.enqueue(items);
        if report.rejected > 0 {
            info!(
                dropped = report.rejected,
                capacity, "Persisted queue exceeded capacity, extra images dropped"
            );
        }
        queue
    }

    /// Append the maximal prefix of `images` that fits; never fails
    pub fn enqueue(&mut self, images: impl IntoIterator<Item = PendingImage>) -> EnqueueReport {
        let mut report = EnqueueReport::default();

        for image in images {
            if self.items.len() < self.capacity {
                debug!(name = %image.name, size = image.size(), "Queued image");
                self.items.push_back(image);
                report.accepted += 1;
            } else {
                report.rejected += 1;
            }
        }

        observability::record_queue_metrics("pending", self.items.len(), self.capacity);
        observability::record_queue_rejections(report.rejected);
        report
    }

    /// Remove and return the first `min(n, len)` images in order
    pub fn drain(&mut self, n: usize) -> Vec<PendingImage> {
        let take = n.min(self.items.len());
        let drained: Vec<PendingImage> = self.items.drain(..take).collect();
        observability::record_queue_metrics("pending", self.items.len(), self.capacity);
        drained
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingImage> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> Vec<PendingImage> {
        (0..n)
            .map(|i| PendingImage::new(format!("img{}.png", i), "image/png", vec![i as u8]))
            .collect()
    }

    #[test]
    fn test_enqueue_keeps_prefix() {
        let mut queue = PendingQueue::new(5);
        assert_eq!(
            queue.enqueue(images(3)),
            EnqueueReport {
                accepted: 3,
                rejected: 0
            }
        );

        let report = queue.enqueue(images(4));
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, 2);
        assert_eq!(queue.size(), 5);
        assert_eq!(queue.remaining(), 0);

        let names: Vec<&str> = queue.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["img0.png", "img1.png", "img2.png", "img0.png", "img1.png"]);
    }

    #[test]
    fn test_drain_is_fifo_and_bounded() {
        let mut queue = PendingQueue::new(10);
        queue.enqueue(images(3));

        let first = queue.drain(2);
        assert_eq!(first[0].name, "img0.png");
        assert_eq!(first[1].name, "img1.png");

        let rest = queue.drain(10);
        assert_eq!(rest.len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain(1).is_empty());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let image = PendingImage::new("a.png", "image/png", vec![0; 4096]);
        let rendered = format!("{:?}", image);
        assert!(rendered.contains("4096"));
        assert!(rendered.len() < 100);
    }
}
