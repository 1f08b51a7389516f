//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds the [`Page`] buffer itself. The bookkeeping that says
//! which page is loaded, how often it is pinned and whether it is dirty
//! lives in [`FrameMeta`], which the buffer pool keeps behind its latch.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// Frames are allocated once at startup; each can hold one page.
/// Page contents are protected by a `RwLock` so several readers can share
/// a pinned page while a writer gets exclusive access.
pub struct Frame {
    page: RwLock<Page>,
}

impl Frame {
    /// Create a new frame holding a zeroed page of `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: RwLock::new(Page::new(page_size)),
        }
    }

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }
}

/// Bookkeeping for one frame, guarded by the buffer pool latch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FrameMeta {
    /// Which page is currently loaded, or None if the frame is empty.
    pub page_id: Option<PageId>,
    /// Number of live guards on this frame.
    pub pin_count: u32,
    /// Whether the page has been modified since loading.
    pub is_dirty: bool,
}

impl FrameMeta {
    /// Increment the pin count. Returns the new pin count.
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    pub fn unpin(&mut self) -> u32 {
        assert!(self.pin_count > 0, "pin count underflow");
        self.pin_count -= 1;
        self.pin_count
    }

    /// Forget the loaded page.
    pub fn clear(&mut self) {
        *self = FrameMeta::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_page_access() {
        let frame = Frame::new(256);
        frame.page_mut().set_i32(20, 0xAB);
        assert_eq!(frame.page().get_i32(20), 0xAB);
        assert_eq!(frame.page().size(), 256);
    }

    #[test]
    fn test_meta_pin_unpin() {
        let mut meta = FrameMeta::default();
        assert_eq!(meta.pin(), 1);
        assert_eq!(meta.pin(), 2);
        assert_eq!(meta.unpin(), 1);
        assert_eq!(meta.unpin(), 0);
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn test_meta_unpin_underflow() {
        FrameMeta::default().unpin();
    }

    #[test]
    fn test_meta_clear() {
        let mut meta = FrameMeta {
            page_id: Some(PageId::new(9)),
            pin_count: 0,
            is_dirty: true,
        };
        meta.clear();
        assert_eq!(meta, FrameMeta::default());
    }

    #[test]
    fn test_frame_concurrent_reads() {
        use std::sync::Arc;
        use std::thread;

        let frame = Arc::new(Frame::new(128));
        frame.page_mut().set_u8(0, 0x42);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let frame = Arc::clone(&frame);
                thread::spawn(move || assert_eq!(frame.page().get_u8(0), 0x42))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
