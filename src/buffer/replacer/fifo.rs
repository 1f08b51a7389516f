//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// A simple FIFO eviction policy.
///
/// Evicts frames in the order their pages were loaded. Pinned frames keep
/// their place in the queue and are passed over until they become
/// evictable again.
#[derive(Debug, Default)]
pub struct FifoReplacer {
    /// Frame IDs in load order (front = oldest).
    queue: VecDeque<FrameId>,

    /// Set for O(1) membership check.
    in_queue: HashSet<FrameId>,

    /// Frames that are currently evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame was accessed.
    ///
    /// Only the first access after loading enqueues the frame; later
    /// accesses do not reorder it.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if self.in_queue.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    /// Mark a frame as evictable (pin_count dropped to 0) or not.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select and forget the oldest evictable frame.
    ///
    /// Returns None if every tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let position = self
            .queue
            .iter()
            .position(|frame_id| self.evictable.contains(frame_id))?;
        let frame_id = self.queue.remove(position)?;
        self.in_queue.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Remove a frame from the replacer entirely.
    ///
    /// Called when a page is dropped from the buffer pool.
    pub fn remove(&mut self, frame_id: FrameId) {
        if self.in_queue.remove(&frame_id) {
            self.queue.retain(|f| *f != frame_id);
        }
        self.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(replacer: &mut FifoReplacer, ids: &[usize]) {
        for &id in ids {
            replacer.record_access(FrameId::new(id));
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut replacer = FifoReplacer::new();
        frames(&mut replacer, &[0, 1, 2]);
        for id in 0..3 {
            replacer.set_evictable(FrameId::new(id), true);
        }

        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pinned_frame_keeps_its_place() {
        let mut replacer = FifoReplacer::new();
        frames(&mut replacer, &[0, 1]);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 0 is pinned and skipped, but not forgotten
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_remove() {
        let mut replacer = FifoReplacer::new();
        frames(&mut replacer, &[0, 1]);
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_reaccess_does_not_reorder() {
        let mut replacer = FifoReplacer::new();
        frames(&mut replacer, &[0, 1, 0]);
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }
}
