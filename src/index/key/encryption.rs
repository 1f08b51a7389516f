//! Encryption adapter for stored keys.

use crate::common::Result;

/// Symmetric cipher applied to serialized keys before they reach a page.
///
/// The crate ships no cipher. Implementations must be deterministic: the
/// same plaintext always yields a ciphertext that decrypts back to it, and
/// `decrypt(encrypt(x)) == x`.
pub trait Encryption: Send + Sync {
    /// Human readable name, used in log messages.
    fn name(&self) -> &str;

    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>>;
}
