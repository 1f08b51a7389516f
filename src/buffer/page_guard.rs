//! RAII pins for page access.
//!
//! - [`PageReadGuard`] - shared read access (multiple allowed)
//! - [`PageWriteGuard`] - exclusive write access
//!
//! Both guards release the frame latch first and then drop the pin, on
//! every exit path. A write guard only dirties its frame once the page was
//! actually borrowed mutably.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// Pin count held on one frame; released on drop.
struct Pin<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    dirty: bool,
}

impl Drop for Pin<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirty);
    }
}

/// Shared pin on a cached page.
///
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let size = guard.get_i32(17);
/// ```
pub struct PageReadGuard<'a> {
    // Field order matters: the latch goes before the pin
    lock: RwLockReadGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        let pin = Pin {
            bpm,
            frame_id,
            page_id,
            dirty: false,
        };
        Self { lock, pin }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Exclusive pin on a cached page.
pub struct PageWriteGuard<'a> {
    lock: RwLockWriteGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        let pin = Pin {
            bpm,
            frame_id,
            page_id,
            dirty: false,
        };
        Self { lock, pin }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Whether the page was borrowed mutably through this guard.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.pin.dirty
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.pin.dirty = true;
        &mut self.lock
    }
}
