//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O
//! - [`page`] - Page types, header and the typed page accessor

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;
