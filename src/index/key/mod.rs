//! Keys: codecs, composite keys and the encryption adapter.
//!
//! An index is built over one [`KeyCodec`], chosen at construction and fixed
//! for the lifetime of the index files (its [`KeyCodec::id`] is persisted in
//! the entry point page). The tree never looks inside a key; it only asks the
//! codec to serialize, measure, decode and compare.

mod composite;
mod encryption;
mod primitive;
mod serializer;

use std::cmp::Ordering;
use std::fmt;

pub use composite::{CompositeKey, CompositeKeyCodec, KeyComponent, KeyValue};
pub use encryption::Encryption;
pub use primitive::{IntegerKeyCodec, LongKeyCodec, StringKeyCodec};
pub use serializer::KeySerializer;

use crate::common::Result;

/// Declared type of one key component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Integer,
    Long,
    String,
    Binary,
}

/// Which end of a prefix range a partial composite key should stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialSearchMode {
    /// Pad with [`KeyComponent::AlwaysLess`]: sorts before every key with the prefix.
    LowestBoundary,
    /// Pad with [`KeyComponent::AlwaysGreater`]: sorts after every key with the prefix.
    HighestBoundary,
}

/// Serialization and ordering of the keys of one index.
///
/// # Contract
/// - `serialize` appends exactly `serialized_size(key)` bytes
/// - `encoded_len` reads the length of a serialized key from the start of
///   a byte slice that may continue past the key
/// - `compare` is a total order on serializable keys
pub trait KeyCodec: Send + Sync {
    type Key: Clone + fmt::Debug + Send + Sync;

    /// Persisted identifier, checked when an index is loaded.
    fn id(&self) -> u8;

    fn serialized_size(&self, key: &Self::Key) -> Result<usize>;

    fn serialize(&self, key: &Self::Key, out: &mut Vec<u8>) -> Result<()>;

    /// Length of the serialized key at the start of `bytes`.
    fn encoded_len(&self, bytes: &[u8]) -> Result<usize>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Key>;

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Normalize a caller supplied key against the index key types.
    ///
    /// Returns the reason as `Err` when the key does not fit.
    fn preprocess(
        &self,
        key: Self::Key,
        key_types: &[KeyType],
    ) -> std::result::Result<Self::Key, String> {
        let _ = key_types;
        Ok(key)
    }

    /// Number of components in `key`.
    fn arity(&self, key: &Self::Key) -> usize {
        let _ = key;
        1
    }

    /// Pad a partial key up to `key_size` components.
    fn pad_partial(&self, key: Self::Key, key_size: usize, mode: PartialSearchMode) -> Self::Key {
        let _ = (key_size, mode);
        key
    }
}

/// Read a little-endian `i32` length prefix at `offset` of `bytes`.
pub(crate) fn read_len(bytes: &[u8], offset: usize) -> Result<usize> {
    let raw = bytes
        .get(offset..offset + 4)
        .ok_or_else(|| crate::common::Error::Codec(format!("length prefix at {offset} is truncated")))?;
    let len = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    usize::try_from(len).map_err(|_| crate::common::Error::Codec(format!("negative length {len}")))
}

/// Append an `i32` length prefix.
pub(crate) fn write_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| crate::common::Error::Codec(format!("length {len} does not fit in i32")))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;

    #[test]
    fn test_len_prefix() {
        let mut out = Vec::new();
        write_len(&mut out, 300).unwrap();
        out.push(0xFF);
        assert_eq!(read_len(&out, 0).unwrap(), 300);
    }

    #[test]
    fn test_len_prefix_truncated_or_negative() {
        assert!(matches!(read_len(&[1, 2], 0), Err(Error::Codec(_))));
        assert!(matches!(read_len(&(-5i32).to_le_bytes(), 0), Err(Error::Codec(_))));
    }
}
