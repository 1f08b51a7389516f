//! Codecs for single-valued keys.

use std::cmp::Ordering;

use super::{read_len, write_len, KeyCodec};
use crate::common::{Error, Result};

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::Codec(format!("{what} key needs {N} bytes, got {}", bytes.len())))
}

/// `i32` keys, 4 bytes little-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerKeyCodec;

impl KeyCodec for IntegerKeyCodec {
    type Key = i32;

    fn id(&self) -> u8 {
        1
    }

    fn serialized_size(&self, _key: &i32) -> Result<usize> {
        Ok(4)
    }

    fn serialize(&self, key: &i32, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&key.to_le_bytes());
        Ok(())
    }

    fn encoded_len(&self, bytes: &[u8]) -> Result<usize> {
        fixed::<4>(bytes, "integer").map(|_| 4)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<i32> {
        fixed(bytes, "integer").map(i32::from_le_bytes)
    }

    fn compare(&self, a: &i32, b: &i32) -> Ordering {
        a.cmp(b)
    }
}

/// `i64` keys, 8 bytes little-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongKeyCodec;

impl KeyCodec for LongKeyCodec {
    type Key = i64;

    fn id(&self) -> u8 {
        2
    }

    fn serialized_size(&self, _key: &i64) -> Result<usize> {
        Ok(8)
    }

    fn serialize(&self, key: &i64, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&key.to_le_bytes());
        Ok(())
    }

    fn encoded_len(&self, bytes: &[u8]) -> Result<usize> {
        fixed::<8>(bytes, "long").map(|_| 8)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<i64> {
        fixed(bytes, "long").map(i64::from_le_bytes)
    }

    fn compare(&self, a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }
}

/// UTF-8 string keys: `i32` byte length followed by the bytes.
///
/// Ordering is byte-wise, which for UTF-8 equals code point order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringKeyCodec;

impl KeyCodec for StringKeyCodec {
    type Key = String;

    fn id(&self) -> u8 {
        3
    }

    fn serialized_size(&self, key: &String) -> Result<usize> {
        Ok(4 + key.len())
    }

    fn serialize(&self, key: &String, out: &mut Vec<u8>) -> Result<()> {
        write_len(out, key.len())?;
        out.extend_from_slice(key.as_bytes());
        Ok(())
    }

    fn encoded_len(&self, bytes: &[u8]) -> Result<usize> {
        let len = 4 + read_len(bytes, 0)?;
        if len > bytes.len() {
            return Err(Error::Codec(format!("string key of {len} bytes is truncated")));
        }
        Ok(len)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String> {
        let len = self.encoded_len(bytes)?;
        String::from_utf8(bytes[4..len].to_vec()).map_err(|e| Error::Codec(e.to_string()))
    }

    fn compare(&self, a: &String, b: &String) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_codec() {
        let codec = IntegerKeyCodec;
        let mut out = Vec::new();
        codec.serialize(&-7, &mut out).unwrap();
        out.extend_from_slice(&[9, 9]);

        assert_eq!(codec.encoded_len(&out).unwrap(), 4);
        assert_eq!(codec.deserialize(&out).unwrap(), -7);
        assert_eq!(codec.compare(&-7, &3), Ordering::Less);
        assert!(codec.deserialize(&[1, 2]).is_err());
    }

    #[test]
    fn test_long_codec() {
        let codec = LongKeyCodec;
        let mut out = Vec::new();
        codec.serialize(&(1i64 << 40), &mut out).unwrap();

        assert_eq!(codec.serialized_size(&0).unwrap(), out.len());
        assert_eq!(codec.deserialize(&out).unwrap(), 1i64 << 40);
    }

    #[test]
    fn test_string_codec() {
        let codec = StringKeyCodec;
        let key = "grüße".to_string();
        let mut out = Vec::new();
        codec.serialize(&key, &mut out).unwrap();
        out.push(0xAA);

        assert_eq!(codec.encoded_len(&out).unwrap(), codec.serialized_size(&key).unwrap());
        assert_eq!(codec.deserialize(&out).unwrap(), key);
        assert_eq!(codec.compare(&"a".into(), &"ab".into()), Ordering::Less);
    }

    #[test]
    fn test_string_codec_rejects_truncated() {
        let mut out = Vec::new();
        write_len(&mut out, 10).unwrap();
        out.extend_from_slice(b"abc");
        assert!(matches!(StringKeyCodec.encoded_len(&out), Err(Error::Codec(_))));
    }
}
