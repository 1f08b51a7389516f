//! Single-value B+Tree.
//!
//! # Structure
//! ```text
//!                     ┌──────────────┐
//!   page 0 (.cbt)     │ entry point  │  tree size, pages size
//!                     └──────────────┘
//!                     ┌──────────────┐
//!   page 1 (.cbt)     │     root     │  internal once it has split
//!                     └──────┬───────┘
//!              ┌─────────────┴────────────┐
//!        ┌─────▼─────┐              ┌─────▼─────┐
//!        │   leaf    │ ◀──────────▶ │   leaf    │  sibling chain
//!        └───────────┘              └───────────┘
//!
//!   page 0 (.nbt)     null bucket: value of the null key
//! ```
//!
//! - [`CellBTree`] - the index: lifecycle, point operations, cursors
//! - [`Bucket`] - slotted page view of one node
//! - [`EntryPoint`] / [`NullBucket`] - metadata pages
//! - [`Cursor`] - batched range iteration
//!
//! Buckets are never merged or freed; emptied buckets stay linked and are
//! skipped by cursors and `first_key`/`last_key`.

mod bucket;
mod cursor;
mod entry_point;
mod null_bucket;
mod search;
mod split;
mod tree;

pub use bucket::{internal_capacity, Bucket, SearchResult, POSITIONS_OFFSET};
pub use cursor::Cursor;
pub use entry_point::EntryPoint;
pub use null_bucket::NullBucket;
pub use tree::{CellBTree, Validation};
