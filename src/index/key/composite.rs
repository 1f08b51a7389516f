//! Composite keys: an ordered list of typed components.
//!
//! # Serialized layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     total length in bytes, header included (i32)
//! 4       4     component count (i32)
//! 8       ...   components, each: tag (u8) + payload
//!
//! Tag  Payload
//! ---  -------
//! 1    i32
//! 2    i64
//! 3    i32 length + UTF-8 bytes
//! 4    i32 length + raw bytes
//! ```

use std::cmp::Ordering;

use super::{read_len, write_len, KeyCodec, KeyType, PartialSearchMode};
use crate::common::{Error, Result};

const HEADER_SIZE: usize = 8;

const TAG_INTEGER: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_BINARY: u8 = 4;

/// A concrete component value.
///
/// Values of different variants order by variant; keys are normalized by
/// [`KeyCodec::preprocess`] so that stored components of one position share
/// a variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Integer(i32),
    Long(i64),
    String(String),
    Binary(Vec<u8>),
}

impl KeyValue {
    fn key_type(&self) -> KeyType {
        match self {
            KeyValue::Integer(_) => KeyType::Integer,
            KeyValue::Long(_) => KeyType::Long,
            KeyValue::String(_) => KeyType::String,
            KeyValue::Binary(_) => KeyType::Binary,
        }
    }
}

/// One position of a composite key.
///
/// `AlwaysLess` and `AlwaysGreater` only appear in search keys built from
/// partial keys; they are never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyComponent {
    AlwaysLess,
    Value(KeyValue),
    AlwaysGreater,
}

impl From<i32> for KeyComponent {
    fn from(v: i32) -> Self {
        KeyComponent::Value(KeyValue::Integer(v))
    }
}

impl From<i64> for KeyComponent {
    fn from(v: i64) -> Self {
        KeyComponent::Value(KeyValue::Long(v))
    }
}

impl From<&str> for KeyComponent {
    fn from(v: &str) -> Self {
        KeyComponent::Value(KeyValue::String(v.to_string()))
    }
}

impl From<String> for KeyComponent {
    fn from(v: String) -> Self {
        KeyComponent::Value(KeyValue::String(v))
    }
}

impl From<Vec<u8>> for KeyComponent {
    fn from(v: Vec<u8>) -> Self {
        KeyComponent::Value(KeyValue::Binary(v))
    }
}

/// An ordered list of key components.
///
/// # Example
/// ```
/// use cellbtree::index::key::{CompositeKey, KeyComponent};
///
/// let key = CompositeKey::new(vec!["A".into(), 1i32.into()]);
/// assert_eq!(key.len(), 2);
/// assert_eq!(CompositeKey::from(vec![KeyComponent::from("A")]).len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompositeKey(pub Vec<KeyComponent>);

impl CompositeKey {
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self(components)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> &[KeyComponent] {
        &self.0
    }
}

impl From<Vec<KeyComponent>> for CompositeKey {
    fn from(components: Vec<KeyComponent>) -> Self {
        Self(components)
    }
}

/// Codec for [`CompositeKey`].
///
/// Two keys compare over their common prefix only: a key that is a prefix
/// of another compares equal to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeKeyCodec;

impl CompositeKeyCodec {
    fn value_size(value: &KeyValue) -> usize {
        1 + match value {
            KeyValue::Integer(_) => 4,
            KeyValue::Long(_) => 8,
            KeyValue::String(s) => 4 + s.len(),
            KeyValue::Binary(b) => 4 + b.len(),
        }
    }

    fn take(bytes: &[u8], pos: usize, n: usize) -> Result<&[u8]> {
        bytes
            .get(pos..pos + n)
            .ok_or_else(|| Error::Codec(format!("composite component at {pos} is truncated")))
    }

    fn stored_value(component: &KeyComponent) -> Result<&KeyValue> {
        match component {
            KeyComponent::Value(value) => Ok(value),
            other => Err(Error::Codec(format!("{other:?} can not be serialized"))),
        }
    }
}

impl KeyCodec for CompositeKeyCodec {
    type Key = CompositeKey;

    fn id(&self) -> u8 {
        4
    }

    fn serialized_size(&self, key: &CompositeKey) -> Result<usize> {
        key.0.iter().try_fold(HEADER_SIZE, |acc, c| {
            Ok(acc + Self::value_size(Self::stored_value(c)?))
        })
    }

    fn serialize(&self, key: &CompositeKey, out: &mut Vec<u8>) -> Result<()> {
        write_len(out, self.serialized_size(key)?)?;
        write_len(out, key.len())?;
        for component in &key.0 {
            match Self::stored_value(component)? {
                KeyValue::Integer(v) => {
                    out.push(TAG_INTEGER);
                    out.extend_from_slice(&v.to_le_bytes());
                }
                KeyValue::Long(v) => {
                    out.push(TAG_LONG);
                    out.extend_from_slice(&v.to_le_bytes());
                }
                KeyValue::String(s) => {
                    out.push(TAG_STRING);
                    write_len(out, s.len())?;
                    out.extend_from_slice(s.as_bytes());
                }
                KeyValue::Binary(b) => {
                    out.push(TAG_BINARY);
                    write_len(out, b.len())?;
                    out.extend_from_slice(b);
                }
            }
        }
        Ok(())
    }

    fn encoded_len(&self, bytes: &[u8]) -> Result<usize> {
        let len = read_len(bytes, 0)?;
        if len < HEADER_SIZE || len > bytes.len() {
            return Err(Error::Codec(format!(
                "composite key length {len} outside [{HEADER_SIZE}, {}]",
                bytes.len()
            )));
        }
        Ok(len)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CompositeKey> {
        let len = self.encoded_len(bytes)?;
        let bytes = &bytes[..len];
        let count = read_len(bytes, 4)?;
        let mut components = Vec::with_capacity(count.min(64));
        let mut pos = HEADER_SIZE;

        for _ in 0..count {
            let tag = Self::take(bytes, pos, 1)?[0];
            pos += 1;
            let value = match tag {
                TAG_INTEGER => {
                    let raw = Self::take(bytes, pos, 4)?;
                    pos += 4;
                    KeyValue::Integer(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
                }
                TAG_LONG => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(Self::take(bytes, pos, 8)?);
                    pos += 8;
                    KeyValue::Long(i64::from_le_bytes(raw))
                }
                TAG_STRING | TAG_BINARY => {
                    let n = read_len(bytes, pos)?;
                    let raw = Self::take(bytes, pos + 4, n)?.to_vec();
                    pos += 4 + n;
                    if tag == TAG_STRING {
                        KeyValue::String(String::from_utf8(raw).map_err(|e| Error::Codec(e.to_string()))?)
                    } else {
                        KeyValue::Binary(raw)
                    }
                }
                other => return Err(Error::Codec(format!("unknown component tag {other}"))),
            };
            components.push(KeyComponent::Value(value));
        }
        Ok(CompositeKey(components))
    }

    fn compare(&self, a: &CompositeKey, b: &CompositeKey) -> Ordering {
        a.0.iter()
            .zip(&b.0)
            .map(|(x, y)| x.cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn preprocess(
        &self,
        key: CompositeKey,
        key_types: &[KeyType],
    ) -> std::result::Result<CompositeKey, String> {
        if key_types.is_empty() {
            return Ok(key);
        }
        if key.len() > key_types.len() {
            return Err(format!(
                "key has {} components, index declares {}",
                key.len(),
                key_types.len()
            ));
        }

        key.0
            .into_iter()
            .zip(key_types)
            .enumerate()
            .map(|(i, (component, ty))| match component {
                KeyComponent::Value(KeyValue::Integer(v)) if *ty == KeyType::Long => {
                    Ok(KeyComponent::Value(KeyValue::Long(i64::from(v))))
                }
                KeyComponent::Value(value) if value.key_type() != *ty => Err(format!(
                    "component {i} is {:?}, index declares {ty:?}",
                    value.key_type()
                )),
                other => Ok(other),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(CompositeKey)
    }

    fn arity(&self, key: &CompositeKey) -> usize {
        key.len()
    }

    fn pad_partial(&self, mut key: CompositeKey, key_size: usize, mode: PartialSearchMode) -> CompositeKey {
        let filler = match mode {
            PartialSearchMode::LowestBoundary => KeyComponent::AlwaysLess,
            PartialSearchMode::HighestBoundary => KeyComponent::AlwaysGreater,
        };
        while key.len() < key_size {
            key.0.push(filler.clone());
        }
        key
    }
}
