//! Common types and utilities shared across the engine.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration ([`IndexConfig`] and defaults)
//! - Error types
//! - Identifiers (PageId, FrameId, FileId) and the stored value type [`Rid`]

pub mod config;
pub mod error;
mod file_id;
mod frame_id;
mod page_id;
mod rid;

pub use config::IndexConfig;
pub use error::{Error, Result};
pub use file_id::FileId;
pub use frame_id::FrameId;
pub use page_id::PageId;
pub use rid::Rid;
