//! Stored key bytes: codec output, optionally wrapped as ciphertext.
//!
//! ```text
//! plain:      codec bytes
//! encrypted:  i32 ciphertext length ++ ciphertext
//! ```

use std::cmp::Ordering;

use super::{read_len, write_len, Encryption, KeyCodec};
use crate::common::{Error, Result};

/// Codec plus optional cipher of one index: turns keys into stored bytes and back.
pub struct KeySerializer<'a, C: KeyCodec> {
    codec: &'a C,
    encryption: Option<&'a dyn Encryption>,
}

impl<'a, C: KeyCodec> KeySerializer<'a, C> {
    pub fn new(codec: &'a C, encryption: Option<&'a dyn Encryption>) -> Self {
        Self { codec, encryption }
    }

    /// Bytes to store for `key`.
    pub fn serialize(&self, key: &C::Key) -> Result<Vec<u8>> {
        let mut plain = Vec::with_capacity(self.codec.serialized_size(key)?);
        self.codec.serialize(key, &mut plain)?;

        match self.encryption {
            None => Ok(plain),
            Some(cipher) => {
                let encrypted = cipher.encrypt(&plain)?;
                let mut out = Vec::with_capacity(4 + encrypted.len());
                write_len(&mut out, encrypted.len())?;
                out.extend_from_slice(&encrypted);
                Ok(out)
            }
        }
    }

    /// Length of the stored key at the start of `bytes`.
    pub fn raw_len(&self, bytes: &[u8]) -> Result<usize> {
        let len = match self.encryption {
            None => self.codec.encoded_len(bytes)?,
            Some(_) => 4 + read_len(bytes, 0)?,
        };
        if len > bytes.len() {
            return Err(Error::Codec(format!(
                "stored key of {len} bytes overruns its page ({} left)",
                bytes.len()
            )));
        }
        Ok(len)
    }

    /// Decode the stored key at the start of `raw`.
    pub fn decode(&self, raw: &[u8]) -> Result<C::Key> {
        match self.encryption {
            None => self.codec.deserialize(raw),
            Some(cipher) => {
                let len = self.raw_len(raw)?;
                let plain = cipher.decrypt(&raw[4..len])?;
                self.codec.deserialize(&plain)
            }
        }
    }

    #[inline]
    pub fn compare(&self, a: &C::Key, b: &C::Key) -> Ordering {
        self.codec.compare(a, b)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::key::{IntegerKeyCodec, StringKeyCodec};

    /// XOR "cipher" used throughout the tests.
    pub(crate) struct XorCipher(pub u8);

    impl Encryption for XorCipher {
        fn name(&self) -> &str {
            "xor"
        }

        fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
            Ok(plain.iter().map(|b| b ^ self.0).collect())
        }

        fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
            self.encrypt(cipher)
        }
    }

    #[test]
    fn test_plain_bytes_are_codec_bytes() {
        let keys = KeySerializer::new(&IntegerKeyCodec, None);
        let raw = keys.serialize(&42).unwrap();
        assert_eq!(raw, 42i32.to_le_bytes());
        assert_eq!(keys.raw_len(&raw).unwrap(), 4);
        assert_eq!(keys.decode(&raw).unwrap(), 42);
    }

    #[test]
    fn test_encrypted_bytes_are_length_prefixed() {
        let cipher = XorCipher(0x5A);
        let keys = KeySerializer::new(&StringKeyCodec, Some(&cipher));

        let mut raw = keys.serialize(&"secret".to_string()).unwrap();
        assert_eq!(read_len(&raw, 0).unwrap(), 4 + 6);
        assert!(!raw.windows(6).any(|w| w == b"secret"));

        raw.extend_from_slice(&[1, 2, 3]);
        assert_eq!(keys.raw_len(&raw).unwrap(), raw.len() - 3);
        assert_eq!(keys.decode(&raw).unwrap(), "secret");
    }

    #[test]
    fn test_raw_len_overrun() {
        let cipher = XorCipher(1);
        let keys = KeySerializer::new(&IntegerKeyCodec, Some(&cipher));
        let mut raw = Vec::new();
        write_len(&mut raw, 100).unwrap();
        assert!(matches!(keys.raw_len(&raw), Err(Error::Codec(_))));
    }
}
