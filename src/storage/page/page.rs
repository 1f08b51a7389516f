//! Page - the fixed-size unit of storage and the typed accessor over it.
//!
//! A [`Page`] owns one page-sized byte buffer. Everything above it (bucket,
//! entry point, null bucket) works purely in offsets computed from fixed
//! header field sizes and goes through the typed getters and setters here.
//! Values are little-endian. Out-of-range offsets panic.

use super::page_header::{PageHeader, PageType};

/// A page of data.
///
/// The size is chosen per file at runtime, so the buffer is boxed rather
/// than a fixed array.
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone`; copying a page should be explicit,
/// use [`Page::duplicate`].
///
/// # Example
/// ```
/// use cellbtree::storage::page::Page;
///
/// let mut page = Page::new(256);
/// page.set_i32(20, -7);
/// page.move_bytes(20, 40, 4);
/// assert_eq!(page.get_i32(40), -7);
/// ```
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Create a new zeroed page of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Explicit deep copy.
    pub fn duplicate(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }

    /// Overwrite this page with the contents of `other`.
    ///
    /// # Panics
    /// Panics if the pages differ in size.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Size of the page in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    // ========================================================================
    // Header
    // ========================================================================

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    pub fn set_page_type(&mut self, page_type: PageType) {
        self.data[PageHeader::OFFSET_PAGE_TYPE] = page_type as u8;
    }

    pub fn lsn(&self) -> u64 {
        self.get_u64(PageHeader::OFFSET_LSN)
    }

    pub fn set_lsn(&mut self, lsn: u64) {
        self.set_u64(PageHeader::OFFSET_LSN, lsn);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.set_u32(PageHeader::OFFSET_CHECKSUM, checksum);
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    #[inline]
    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[offset..offset + N]);
        out
    }

    #[inline]
    pub fn get_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    #[inline]
    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    #[inline]
    pub fn get_i8(&self, offset: usize) -> i8 {
        self.data[offset] as i8
    }

    #[inline]
    pub fn set_i8(&mut self, offset: usize, value: i8) {
        self.data[offset] = value as u8;
    }

    #[inline]
    pub fn get_i16(&self, offset: usize) -> i16 {
        i16::from_le_bytes(self.array(offset))
    }

    #[inline]
    pub fn set_i16(&mut self, offset: usize, value: i16) {
        self.set_bytes(offset, &value.to_le_bytes());
    }

    #[inline]
    pub fn get_i32(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.array(offset))
    }

    #[inline]
    pub fn set_i32(&mut self, offset: usize, value: i32) {
        self.set_bytes(offset, &value.to_le_bytes());
    }

    #[inline]
    pub fn get_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.array(offset))
    }

    #[inline]
    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.set_bytes(offset, &value.to_le_bytes());
    }

    #[inline]
    pub fn get_i64(&self, offset: usize) -> i64 {
        i64::from_le_bytes(self.array(offset))
    }

    #[inline]
    pub fn set_i64(&mut self, offset: usize, value: i64) {
        self.set_bytes(offset, &value.to_le_bytes());
    }

    #[inline]
    pub fn get_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.array(offset))
    }

    #[inline]
    pub fn set_u64(&mut self, offset: usize, value: u64) {
        self.set_bytes(offset, &value.to_le_bytes());
    }

    /// Borrow `len` bytes starting at `offset`.
    #[inline]
    pub fn get_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Borrow everything from `offset` to the end of the page.
    #[inline]
    pub fn tail(&self, offset: usize) -> &[u8] {
        &self.data[offset..]
    }

    #[inline]
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Copy `len` bytes from `src` to `dst`; the ranges may overlap.
    #[inline]
    pub fn move_bytes(&mut self, src: usize, dst: usize, len: usize) {
        self.data.copy_within(src..src + len, dst);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_new_is_zeroed() {
        let page = Page::new(4096);
        assert_eq!(page.size(), 4096);
        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_typed_accessors() {
        let mut page = Page::new(128);

        page.set_i8(20, -3);
        page.set_i16(21, -1234);
        page.set_i32(23, i32::MIN);
        page.set_i64(27, -99_999_999_999);
        page.set_u32(35, 0xDEAD_BEEF);

        assert_eq!(page.get_i8(20), -3);
        assert_eq!(page.get_i16(21), -1234);
        assert_eq!(page.get_i32(23), i32::MIN);
        assert_eq!(page.get_i64(27), -99_999_999_999);
        assert_eq!(page.get_u32(35), 0xDEAD_BEEF);
    }

    #[test]
    fn test_accessors_are_little_endian() {
        let mut page = Page::new(128);
        page.set_i32(40, 0x04030201);
        assert_eq!(page.get_bytes(40, 4), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_move_bytes_overlapping() {
        let mut page = Page::new(128);
        page.set_bytes(10, &[1, 2, 3, 4, 5, 6]);

        page.move_bytes(10, 12, 6);
        assert_eq!(page.get_bytes(12, 6), &[1, 2, 3, 4, 5, 6]);

        page.move_bytes(12, 8, 6);
        assert_eq!(page.get_bytes(8, 6), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds_panics() {
        let page = Page::new(128);
        page.get_i64(124);
    }

    #[test]
    fn test_header_fields() {
        let mut page = Page::new(256);
        page.set_page_type(PageType::Bucket);
        page.set_lsn(77);

        let header = page.header();
        assert_eq!(header.page_type, PageType::Bucket);
        assert_eq!(header.lsn, 77);
        assert_eq!(page.page_type(), PageType::Bucket);
        assert_eq!(page.lsn(), 77);
    }

    #[test]
    fn test_checksum_roundtrip() {
        let mut page = Page::new(256);
        page.set_page_type(PageType::Bucket);
        page.set_i32(100, 42);
        page.update_checksum();
        assert!(page.verify_checksum());

        page.set_i32(100, 43);
        assert!(!page.verify_checksum());
    }

    #[test]
    fn test_duplicate_is_deep() {
        let mut page = Page::new(128);
        page.set_u8(0, 0xAB);

        let mut copy = page.duplicate();
        copy.set_u8(0, 0xCD);

        assert_eq!(page.get_u8(0), 0xAB);
        assert_eq!(copy.get_u8(0), 0xCD);

        page.copy_from(&copy);
        assert_eq!(page.get_u8(0), 0xCD);
    }
}
