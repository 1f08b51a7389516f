//! Configuration for the index engine.
//!
//! Everything the tree reads at runtime is carried by [`IndexConfig`] and
//! threaded through constructors. Nothing is read from the environment.

use crate::common::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Tests use much smaller pages
/// to force node splits with only a handful of keys.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size accepted by [`IndexConfig::validate`].
pub const MIN_PAGE_SIZE: usize = 128;

/// Default bound on the stored size of a single key.
pub const DEFAULT_MAX_KEY_SIZE: usize = 512;

/// Default bound on the number of levels a descent may visit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default number of entries a cursor fetches per batch.
pub const DEFAULT_PREFETCH_SIZE: usize = 10;

/// Default number of frames in each buffer pool.
pub const DEFAULT_BUFFER_POOL_FRAMES: usize = 64;

/// Default WAL size that triggers a checkpoint (4MB).
pub const DEFAULT_CHECKPOINT_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Runtime knobs of one index instance.
///
/// # Example
/// ```
/// use cellbtree::IndexConfig;
///
/// let config = IndexConfig::default()
///     .with_page_size(1024)
///     .with_max_key_size(64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Size of every page of the index files.
    pub page_size: usize,
    /// Largest stored key (after encryption) accepted by `put`.
    pub max_key_size: usize,
    /// Deepest descent tolerated before the tree is reported corrupted.
    pub max_depth: usize,
    /// Entries fetched by a cursor per batch.
    pub prefetch_size: usize,
    /// Frames per buffer pool (one pool per index file).
    pub buffer_pool_frames: usize,
    /// Fsync the WAL on every commit.
    pub sync_on_commit: bool,
    /// WAL size in bytes after which a commit triggers a checkpoint.
    pub checkpoint_threshold: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            prefetch_size: DEFAULT_PREFETCH_SIZE,
            buffer_pool_frames: DEFAULT_BUFFER_POOL_FRAMES,
            sync_on_commit: true,
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_max_key_size(mut self, max_key_size: usize) -> Self {
        self.max_key_size = max_key_size;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_prefetch_size(mut self, prefetch_size: usize) -> Self {
        self.prefetch_size = prefetch_size;
        self
    }

    #[must_use]
    pub fn with_buffer_pool_frames(mut self, frames: usize) -> Self {
        self.buffer_pool_frames = frames;
        self
    }

    #[must_use]
    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    #[must_use]
    pub fn with_checkpoint_threshold(mut self, bytes: u64) -> Self {
        self.checkpoint_threshold = bytes;
        self
    }

    /// Check the knobs for values the engine cannot work with.
    ///
    /// The page size must leave room for at least four internal entries
    /// holding a maximal key, otherwise a split could produce an internal
    /// bucket with no separator left.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE || self.page_size > i32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "page size {} outside [{}, {}]",
                self.page_size,
                MIN_PAGE_SIZE,
                i32::MAX
            )));
        }
        if self.max_key_size == 0 {
            return Err(Error::InvalidConfig("max key size must be > 0".into()));
        }
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("max depth must be > 0".into()));
        }
        if self.prefetch_size == 0 {
            return Err(Error::InvalidConfig("prefetch size must be > 0".into()));
        }
        if self.buffer_pool_frames == 0 {
            return Err(Error::InvalidConfig("buffer pool needs at least one frame".into()));
        }

        if crate::index::btree::internal_capacity(self.page_size, self.max_key_size) < 4 {
            return Err(Error::InvalidConfig(format!(
                "page size {} fits fewer than four keys of {} bytes",
                self.page_size, self.max_key_size
            )));
        }
        Ok(())
    }
}
