//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`] containing metadata:
//! - [`PageType`] discriminator
//! - CRC32 checksum for integrity
//! - LSN of the atomic operation that last wrote the page

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Never-written (all zero) or unknown page.
    #[default]
    Invalid = 0,
    /// Index metadata page (page 0 of the primary file).
    EntryPoint = 1,
    /// B+Tree node, leaf or internal.
    Bucket = 2,
    /// Holder of the value bound to the null key.
    NullBucket = 3,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::EntryPoint,
            2 => PageType::Bucket,
            3 => PageType::NullBucket,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (13 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       8     lsn (Log Sequence Number, little-endian)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire page with the checksum field
/// itself set to zero. It is stamped by the disk manager on write and
/// verified on read, so in-memory pages carry stale checksums.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Type of this page.
    pub page_type: PageType,
    /// CRC32 checksum of the page contents.
    pub checksum: u32,
    /// Log Sequence Number of last modification.
    pub lsn: u64,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 13;

    /// Offset of each field within the header.
    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_LSN: usize = 5;

    /// Create a new header with the given page type.
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            checksum: 0,
            lsn: 0,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]);
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8]);

        Self {
            page_type: PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]),
            checksum: u32::from_le_bytes(checksum),
            lsn: u64::from_le_bytes(lsn),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8].copy_from_slice(&self.lsn.to_le_bytes());
    }

    /// Compute CRC32 checksum of a page of any size.
    ///
    /// The checksum field (bytes 1-4) is hashed as zeros, so the checksum
    /// doesn't include itself.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::EntryPoint);
        assert_eq!(PageType::from_u8(2), PageType::Bucket);
        assert_eq!(PageType::from_u8(3), PageType::NullBucket);
        assert_eq!(PageType::from_u8(255), PageType::Invalid);
    }

    #[test]
    fn test_page_header_roundtrip() {
        let original = PageHeader {
            page_type: PageType::Bucket,
            checksum: 0xDEADBEEF,
            lsn: 0x123456789ABCDEF0,
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        original.write_to(&mut buffer);

        assert_eq!(PageHeader::from_bytes(&buffer), original);
    }

    #[test]
    fn test_page_header_byte_layout() {
        let header = PageHeader {
            page_type: PageType::EntryPoint,
            checksum: 0x04030201,
            lsn: 0x0807060504030201,
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        header.write_to(&mut buffer);

        assert_eq!(buffer[0], 1);
        assert_eq!(buffer[1], 0x01);
        assert_eq!(buffer[4], 0x04);
        assert_eq!(buffer[5], 0x01);
        assert_eq!(buffer[12], 0x08);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut page_data = vec![0u8; 256];
        page_data[100] = 0xAB;

        let checksum1 = PageHeader::compute_checksum(&page_data);
        page_data[1..5].copy_from_slice(&[0xFF; 4]);
        let checksum2 = PageHeader::compute_checksum(&page_data);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_verify() {
        let mut page_data = vec![0u8; 512];
        page_data[100] = 0xAB;

        let header = PageHeader {
            page_type: PageType::Bucket,
            checksum: PageHeader::compute_checksum(&page_data),
            lsn: 0,
        };
        assert!(header.verify_checksum(&page_data));

        page_data[100] = 0xFF;
        assert!(!header.verify_checksum(&page_data));
    }
}
