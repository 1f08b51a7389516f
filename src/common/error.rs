//! Error types for the index engine.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the index engine.
///
/// Lookups of absent keys are not errors; they come back as `Ok(None)`.
/// A validator that asks to ignore a write is not an error either, the
/// write simply reports `Ok(false)`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk or WAL operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., exceeds max pages).
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Attempted to drop or commit a page that is still pinned.
    #[error("Page {0} is still pinned")]
    PagePinned(u32),

    /// Page contents do not match the checksum stored in its header.
    #[error("checksum mismatch on page {page_id}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        page_id: u32,
        stored: u32,
        computed: u32,
    },

    /// The write-ahead log could not be parsed.
    #[error("WAL corrupted: {0}")]
    WalCorrupted(String),

    /// Tree structure is broken, e.g. a descent exceeded the depth bound.
    #[error("index '{index}' is corrupted: {reason}")]
    StructuralCorruption { index: String, reason: String },

    /// Serialized key exceeds the configured maximum.
    #[error("key {key} of {size} bytes exceeds the maximum key size {max} of index '{index}'")]
    KeyTooLarge {
        index: String,
        key: String,
        size: usize,
        max: usize,
    },

    /// Index removal requested while it still holds entries.
    #[error("index '{index}' can not be deleted, it still holds {size} entries")]
    NotEmptyOnDelete { index: String, size: u64 },

    /// Key does not fit the index key descriptors.
    #[error("invalid key {key} for index '{index}': {reason}")]
    InvalidKey {
        index: String,
        key: String,
        reason: String,
    },

    /// Key bytes could not be encoded or decoded.
    #[error("key codec error: {0}")]
    Codec(String),

    /// A commit failed after reaching the log; the store must be reopened.
    #[error("store {0} is unusable after a failed commit, reopen it to replay the log")]
    Poisoned(String),

    /// Key encryption or decryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Configuration or stored metadata is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a [`Error::StructuralCorruption`] for the named index.
    pub fn corruption(index: &str, reason: impl Into<String>) -> Self {
        Error::StructuralCorruption {
            index: index.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "Page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "No free frames available in buffer pool");

        let err = Error::KeyTooLarge {
            index: "people".to_string(),
            key: "\"ada\"".to_string(),
            size: 700,
            max: 512,
        };
        assert_eq!(
            format!("{}", err),
            "key \"ada\" of 700 bytes exceeds the maximum key size 512 of index 'people'"
        );
    }

    #[test]
    fn test_corruption_helper() {
        match Error::corruption("idx", "depth exceeded") {
            Error::StructuralCorruption { index, reason } => {
                assert_eq!(index, "idx");
                assert_eq!(reason, "depth exceeded");
            }
            other => panic!("Expected StructuralCorruption, got {other:?}"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }
}
