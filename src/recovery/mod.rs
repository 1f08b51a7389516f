//! Write-ahead logging, atomic operations and crash recovery.
//!
//! - [`DurableStore`] - page files of one component plus their WAL
//! - [`AtomicOperation`] - shadow pages of one all-or-nothing unit
//! - [`PageSource`] - page reads over either of the two
//! - [`wal`] - log file format
//! - [`recover`] - replay of committed operations on open

mod atomic_operation;
mod durable_store;
mod page_source;
mod replay;
pub mod wal;

pub use atomic_operation::{AtomicOperation, PageView, ShadowPage};
pub use durable_store::DurableStore;
pub use page_source::PageSource;
pub use replay::{recover, RecoveryResult};
