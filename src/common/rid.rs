//! Record identifier, the value type stored by the index.

use std::fmt;

/// Points at a stored record: a cluster and a position inside it.
///
/// # Layout (10 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       2     cluster_id
/// 2       8     cluster_position
/// ```
///
/// # Example
/// ```
/// use cellbtree::Rid;
///
/// let rid = Rid::new(3, 100);
/// assert_eq!(Rid::from_bytes(&rid.to_bytes()), rid);
/// assert_eq!(rid.to_string(), "#3:100");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub cluster_id: i16,
    pub cluster_position: i64,
}

impl Rid {
    /// Encoded size in bytes.
    pub const SIZE: usize = 10;

    #[inline]
    pub const fn new(cluster_id: i16, cluster_position: i64) -> Self {
        Self {
            cluster_id,
            cluster_position,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..2].copy_from_slice(&self.cluster_id.to_le_bytes());
        out[2..].copy_from_slice(&self.cluster_position.to_le_bytes());
        out
    }

    /// Decode a RID from the first [`Rid::SIZE`] bytes of `data`.
    ///
    /// # Panics
    /// Panics if `data` is shorter than [`Rid::SIZE`].
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for Rid");
        let cluster_id = i16::from_le_bytes([data[0], data[1]]);
        let mut position = [0u8; 8];
        position.copy_from_slice(&data[2..10]);
        Self {
            cluster_id,
            cluster_position: i64::from_le_bytes(position),
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster_id, self.cluster_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rid_byte_layout() {
        let rid = Rid::new(0x0201, 0x0807060504030201);
        let bytes = rid.to_bytes();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x02);
        assert_eq!(bytes[2], 0x01);
        assert_eq!(bytes[9], 0x08);
    }

    #[test]
    fn test_rid_negative_values() {
        let rid = Rid::new(-1, -42);
        assert_eq!(Rid::from_bytes(&rid.to_bytes()), rid);
    }

    #[test]
    fn test_rid_ordering() {
        assert!(Rid::new(1, 5) < Rid::new(2, 0));
        assert!(Rid::new(1, 5) < Rid::new(1, 6));
    }
}
