//! Buffer Pool Manager - the page cache of one index file.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through RAII guards
//! - Write-back of dirty pages on eviction and flush
//! - FIFO eviction of unpinned frames

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, MutexGuard};

use crate::buffer::frame::FrameMeta;
use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Latch-protected bookkeeping.
struct PoolState {
    /// Maps page IDs to frame IDs.
    page_table: HashMap<PageId, FrameId>,
    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Vec<FrameId>,
    /// Eviction policy for selecting victim frames.
    replacer: FifoReplacer,
    /// Per-frame metadata, indexed by frame id.
    meta: Vec<FrameMeta>,
}

impl PoolState {
    fn pin(&mut self, frame_id: FrameId) {
        self.meta[frame_id.0].pin();
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
    }
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌───────────────────────────┐  ┌────────────────────────┐  │
/// │  │ state: Mutex<PoolState>   │  │  frames: Vec<Frame>    │  │
/// │  │  page_table PageId → Fid  │─▶│  [F0] [F1] [F2] ...    │  │
/// │  │  free_list, replacer,     │  └────────────────────────┘  │
/// │  │  per-frame pin/dirty      │  ┌────────────────────────┐  │
/// │  └───────────────────────────┘  │ disk_manager: Mutex    │  │
/// │                                 └────────────────────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one latch for page table, free list, replacer and frame
///   metadata, so two threads missing on the same page cannot load it twice
/// - `disk_manager`: `Mutex`, always taken after `state` when both are held
/// - `frames`: no lock of their own beyond each page's `RwLock`
/// - `stats`: atomic counters
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.cbt", 4096)?;
/// let bpm = BufferPoolManager::new(10, dm);
///
/// let mut guard = bpm.new_page()?;
/// guard.set_i32(20, 7);
/// // guard drops: page marked dirty, unpinned
///
/// let guard = bpm.fetch_page_read(PageId::new(0))?;
/// assert_eq!(guard.get_i32(20), 7);
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<PoolState>,

    /// Handles all disk I/O.
    disk_manager: Mutex<DiskManager>,

    /// Performance statistics.
    stats: BufferPoolStats,

    pool_size: usize,
    page_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager over `disk_manager`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let page_size = disk_manager.page_size();
        let frames = (0..pool_size).map(|_| Frame::new(page_size)).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list: (0..pool_size).rev().map(FrameId::new).collect(),
                replacer: FifoReplacer::new(),
                meta: vec![FrameMeta::default(); pool_size],
            }),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
            page_size,
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::ChecksumMismatch` if the on-disk copy is damaged
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// The frame becomes dirty once the guard hands out `&mut Page`.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Allocate pages
    // ========================================================================

    /// Extend the file by one zeroed page without caching it.
    pub fn allocate_page_id(&self) -> Result<PageId> {
        let page_id = self.disk_manager.lock().allocate_page()?;
        self.stats.pages_allocated.fetch_add(1, Ordering::Relaxed);
        Ok(page_id)
    }

    /// Allocate a new page on disk and load it into the buffer pool.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (frame_id, page_id) = {
            let mut state = self.state.lock();
            let frame_id = self.get_free_frame(&mut state)?;

            let page_id = match self.disk_manager.lock().allocate_page() {
                Ok(page_id) => page_id,
                Err(e) => {
                    state.free_list.push(frame_id);
                    return Err(e);
                }
            };

            self.stats.pages_allocated.fetch_add(1, Ordering::Relaxed);
            self.frames[frame_id.0].page_mut().reset();
            state.meta[frame_id.0].page_id = Some(page_id);
            state.page_table.insert(page_id, frame_id);
            state.pin(frame_id);
            (frame_id, page_id)
        };

        let lock = self.frames[frame_id.0].page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a specific page to disk if it's dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        match state.page_table.get(&page_id) {
            Some(&frame_id) => self.flush_frame(&mut state, frame_id),
            None => Ok(()),
        }
    }

    /// Write every dirty page to disk.
    ///
    /// Must not be called while this thread holds a write guard of the pool.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();
        let frames: Vec<FrameId> = state.page_table.values().copied().collect();
        for frame_id in frames {
            self.flush_frame(&mut state, frame_id)?;
        }
        Ok(())
    }

    /// Force the underlying file to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of pages currently cached.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of pages in the file on disk.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Pin count of a cached page, None if the page is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|frame_id| state.meta[frame_id.0].pin_count)
    }

    /// Sum of pin counts over all frames.
    pub fn total_pins(&self) -> u32 {
        self.state.lock().meta.iter().map(|m| m.pin_count).sum()
    }

    // ========================================================================
    // Internal: Called by page guards on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let mut state = self.state.lock();
        let meta = &mut state.meta[frame_id.0];
        meta.is_dirty |= is_dirty;
        if meta.unpin() == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.pin(frame_id);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(frame_id);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.get_free_frame(&mut state)?;

        let loaded = self.disk_manager.lock().read_page(page_id);
        let page = match loaded {
            Ok(page) => page,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        // Frame is unpinned and unmapped, nobody else can reach its page
        self.frames[frame_id.0].page_mut().copy_from(&page);

        state.meta[frame_id.0].page_id = Some(page_id);
        state.page_table.insert(page_id, frame_id);
        state.pin(frame_id);
        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Get a free frame, evicting if necessary.
    fn get_free_frame(&self, state: &mut MutexGuard<'_, PoolState>) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(Error::NoFreeFrames)?;
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.flush_frame(state, frame_id) {
            // Keep the victim cached; it is still the only copy of its data
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, true);
            return Err(e);
        }

        if let Some(old_page_id) = state.meta[frame_id.0].page_id {
            state.page_table.remove(&old_page_id);
        }
        state.meta[frame_id.0].clear();
        Ok(frame_id)
    }

    /// Write a frame to disk if dirty.
    fn flush_frame(&self, state: &mut MutexGuard<'_, PoolState>, frame_id: FrameId) -> Result<()> {
        let meta = &state.meta[frame_id.0];
        let Some(page_id) = meta.page_id else {
            return Ok(());
        };
        if !meta.is_dirty {
            return Ok(());
        }

        {
            let page = self.frames[frame_id.0].page();
            self.disk_manager.lock().write_page(page_id, &page)?;
        }

        state.meta[frame_id.0].is_dirty = false;
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageType;
    use tempfile::tempdir;

    const PAGE: usize = 256;

    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.cbt"), PAGE).unwrap();
        (BufferPoolManager::new(pool_size, dm), dir)
    }

    #[test]
    fn test_new_page_ids_are_sequential() {
        let (bpm, _dir) = create_test_bpm(4);

        let guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(0));
        drop(guard);

        let guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(1));
        assert_eq!(guard.size(), PAGE);
    }

    #[test]
    fn test_fetch_after_write() {
        let (bpm, _dir) = create_test_bpm(4);

        {
            let mut guard = bpm.new_page().unwrap();
            guard.set_i64(40, -5);
        }

        let guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
        assert_eq!(guard.get_i64(40), -5);
    }

    #[test]
    fn test_pins_released_on_drop() {
        let (bpm, _dir) = create_test_bpm(4);
        drop(bpm.new_page().unwrap());

        let a = bpm.fetch_page_read(PageId::new(0)).unwrap();
        let b = bpm.fetch_page_read(PageId::new(0)).unwrap();
        assert_eq!(bpm.pin_count(PageId::new(0)), Some(2));

        drop(a);
        drop(b);
        assert_eq!(bpm.pin_count(PageId::new(0)), Some(0));
        assert_eq!(bpm.total_pins(), 0);
    }

    #[test]
    fn test_eviction_writes_back_dirty_page() {
        let (bpm, _dir) = create_test_bpm(2);

        for i in 0..4 {
            let mut guard = bpm.new_page().unwrap();
            guard.set_page_type(PageType::Bucket);
            guard.set_i32(20, i * 10);
        }

        assert!(bpm.stats().snapshot().evictions >= 2);
        for i in 0..4 {
            let guard = bpm.fetch_page_read(PageId::new(i as u32)).unwrap();
            assert_eq!(guard.get_i32(20), i * 10);
        }
    }

    #[test]
    fn test_no_free_frames_when_all_pinned() {
        let (bpm, _dir) = create_test_bpm(2);

        let _g1 = bpm.new_page().unwrap();
        let _g2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
    }

    #[test]
    fn test_clean_write_guard_is_not_written_back() {
        let (bpm, _dir) = create_test_bpm(1);
        drop(bpm.new_page().unwrap());

        let guard = bpm.fetch_page_write(PageId::new(0)).unwrap();
        assert_eq!(guard.get_i32(20), 0);
        assert!(!guard.is_dirty());
        drop(guard);

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 0);
    }

    #[test]
    fn test_missing_page_returns_frame() {
        let (bpm, _dir) = create_test_bpm(2);

        assert!(matches!(
            bpm.fetch_page_read(PageId::new(9)),
            Err(Error::PageNotFound(9))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
    }

    #[test]
    fn test_allocate_page_id_does_not_cache() {
        let (bpm, _dir) = create_test_bpm(2);

        assert_eq!(bpm.allocate_page_id().unwrap(), PageId::new(0));
        assert_eq!(bpm.allocate_page_id().unwrap(), PageId::new(1));
        assert_eq!(bpm.disk_page_count(), 2);
        assert_eq!(bpm.page_count(), 0);
        assert_eq!(bpm.stats().snapshot().pages_allocated, 2);
    }

    #[test]
    fn test_flush_all_pages_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cbt");

        {
            let bpm = BufferPoolManager::new(4, DiskManager::create(&path, PAGE).unwrap());
            let mut guard = bpm.new_page().unwrap();
            guard.set_page_type(PageType::Bucket);
            guard.set_i32(30, 99);
            drop(guard);
            bpm.flush_all_pages().unwrap();
            bpm.sync().unwrap();
            assert_eq!(bpm.stats().snapshot().pages_written, 1);
        }

        let bpm = BufferPoolManager::new(4, DiskManager::open(&path, PAGE).unwrap());
        assert_eq!(bpm.fetch_page_read(PageId::new(0)).unwrap().get_i32(30), 99);
    }

    #[test]
    fn test_concurrent_readers_share_one_frame() {
        use std::sync::Arc;
        use std::thread;

        let (bpm, _dir) = create_test_bpm(4);
        drop(bpm.new_page().unwrap());
        bpm.flush_all_pages().unwrap();
        let bpm = Arc::new(bpm);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bpm = Arc::clone(&bpm);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bpm.page_count(), 1);
        assert_eq!(bpm.total_pins(), 0);
    }
}
