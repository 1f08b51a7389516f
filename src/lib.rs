//! cellbtree - a disk-resident, crash-safe single-value B+Tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           cellbtree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Index Layer (index/)                      │   │
//! │  │   CellBTree: get / put / remove / cursors               │   │
//! │  │   KeyCodec + Encryption → stored key bytes               │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Atomic Units (recovery/)                   │   │
//! │  │   AtomicOperation: shadow pages, commit as one record    │   │
//! │  │   WriteAheadLog + replay on open                         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │      BufferPoolManager + Frame + pin guards + stats      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Storage Layer (storage/)                   │   │
//! │  │          DiskManager + Page + PageHeader                 │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FileId, Rid, Error, config)
//! - [`buffer`] - Page cache
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+Tree and its key codecs
//! - [`recovery`] - Atomic units, write-ahead logging and crash recovery
//!
//! # Quick Start
//! ```no_run
//! use cellbtree::{CellBTree, IndexConfig, IntegerKeyCodec, Rid};
//!
//! let tree = CellBTree::create(
//!     "/tmp/indexes", "orders_by_id", IntegerKeyCodec, vec![], 1, None, IndexConfig::default(),
//! )?;
//!
//! for id in 0..100 {
//!     tree.put(Some(&id), Rid::new(7, i64::from(id)))?;
//! }
//! let recent: Vec<i32> = tree
//!     .iterate_entries_major(&90, true, false)?
//!     .map(|entry| entry.map(|(key, _)| key))
//!     .collect::<cellbtree::Result<_>>()?;
//! assert_eq!(recent.first(), Some(&99));
//!
//! tree.close()?;
//! # Ok::<(), cellbtree::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::{Error, FileId, FrameId, IndexConfig, PageId, Result, Rid};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::btree::{CellBTree, Cursor, Validation};
pub use index::key::{
    CompositeKey, CompositeKeyCodec, Encryption, IntegerKeyCodec, KeyCodec, KeyComponent,
    KeyType, KeyValue, LongKeyCodec, PartialSearchMode, StringKeyCodec,
};
pub use recovery::{AtomicOperation, DurableStore};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
