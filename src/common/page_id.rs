//! Page identifier type.

use std::fmt;

/// Identifies a page inside one index file.
///
/// Page N lives at byte offset `N × page_size`. Tree pages store child
/// pointers as `i32` and sibling links as `i64` where `-1` means "none";
/// the `*_stored` helpers convert between the two worlds.
///
/// # Example
/// ```
/// use cellbtree::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::from_stored(-1), None);
/// assert_eq!(PageId::from_stored(42), Some(page_id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Decode an on-page link; negative values mean "no page".
    #[inline]
    pub fn from_stored(raw: i64) -> Option<PageId> {
        u32::try_from(raw).ok().map(PageId)
    }

    /// Encode an optional link for an on-page `i64` field.
    #[inline]
    pub fn to_stored(page: Option<PageId>) -> i64 {
        page.map_or(-1, |p| i64::from(p.0))
    }

    /// Index into a file of `page_size` pages.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        u64::from(self.0) * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
