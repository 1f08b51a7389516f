//! Index layer.
//!
//! - [`btree`] - the single-value B+Tree and its page formats
//! - [`key`] - key codecs, composite keys and key encryption

pub mod btree;
pub mod key;
