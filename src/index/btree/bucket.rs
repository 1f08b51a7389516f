//! Bucket - the slotted page of one tree node.
//!
//! # Layout
//! ```text
//! Offset  Size        Field
//! ------  ----        -----
//! 0       13          page header
//! 13      4           free pointer (i32): start of the entry area
//! 17      4           size (i32): number of entries
//! 21      1           is_leaf (i8)
//! 22      8           left sibling (i64, -1 = none, leaves only)
//! 30      8           right sibling (i64, -1 = none, leaves only)
//! 38      4 * size    positions (i32), in key order
//! ...                 free space
//! free    ...         entries, packed towards the end of the page
//!
//! leaf entry     = key bytes ++ i16 cluster id ++ i64 cluster position
//! internal entry = i32 left child ++ i32 right child ++ key bytes
//! ```
//!
//! For two adjacent internal entries `i` and `i + 1`,
//! `right_child(i) == left_child(i + 1)`. Child *positions* `0..=size` name
//! the children of an internal bucket in key order: position `c < size` is
//! `left_child(c)`, position `size` is `right_child(size - 1)`.

use std::ops::{Deref, DerefMut};

use crate::common::{Error, PageId, Result, Rid};
use crate::index::key::{KeyCodec, KeySerializer};
use crate::storage::page::{Page, PageHeader, PageType};

const FREE_POINTER_OFFSET: usize = PageHeader::SIZE;
const SIZE_OFFSET: usize = FREE_POINTER_OFFSET + 4;
const IS_LEAF_OFFSET: usize = SIZE_OFFSET + 4;
const LEFT_SIBLING_OFFSET: usize = IS_LEAF_OFFSET + 1;
const RIGHT_SIBLING_OFFSET: usize = LEFT_SIBLING_OFFSET + 8;

/// First byte of the positions array.
pub const POSITIONS_OFFSET: usize = RIGHT_SIBLING_OFFSET + 8;

/// Bytes of child pointers in front of an internal entry's key.
const CHILDREN_SIZE: usize = 8;

/// Result of a binary search inside a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// The key is stored at this slot.
    Found(usize),
    /// The key is absent; inserting it at this slot keeps the order.
    NotFound(usize),
}

impl SearchResult {
    /// The matching slot or the insertion point.
    pub fn index(self) -> usize {
        match self {
            SearchResult::Found(i) | SearchResult::NotFound(i) => i,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, SearchResult::Found(_))
    }
}

/// A view of one page as a tree node.
///
/// Reading needs any pinned page; writing needs a mutable pin.
pub struct Bucket<P> {
    page: P,
}

impl<P: Deref<Target = Page>> Bucket<P> {
    pub fn new(page: P) -> Self {
        Self { page }
    }

    pub fn into_inner(self) -> P {
        self.page
    }

    /// Whether the page was ever initialized as a bucket.
    pub fn is_initialized(&self) -> bool {
        self.page.page_type() == PageType::Bucket
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.page.get_i32(SIZE_OFFSET).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.page.get_i8(IS_LEAF_OFFSET) > 0
    }

    #[inline]
    fn free_pointer(&self) -> usize {
        self.page.get_i32(FREE_POINTER_OFFSET).max(0) as usize
    }

    #[inline]
    fn position(&self, index: usize) -> usize {
        self.page.get_i32(POSITIONS_OFFSET + index * 4).max(0) as usize
    }

    pub fn left_sibling(&self) -> Option<PageId> {
        PageId::from_stored(self.page.get_i64(LEFT_SIBLING_OFFSET))
    }

    pub fn right_sibling(&self) -> Option<PageId> {
        PageId::from_stored(self.page.get_i64(RIGHT_SIBLING_OFFSET))
    }

    /// Binary search for `key`.
    pub fn find<C: KeyCodec>(&self, key: &C::Key, keys: &KeySerializer<'_, C>) -> Result<SearchResult> {
        let mut low = 0;
        let mut high = self.size();
        while low < high {
            let mid = low + (high - low) / 2;
            let stored = self.get_key(mid, keys)?;
            match keys.compare(&stored, key) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Ok(SearchResult::Found(mid)),
            }
        }
        Ok(SearchResult::NotFound(low))
    }

    fn key_offset(&self, index: usize) -> usize {
        let position = self.position(index);
        if self.is_leaf() {
            position
        } else {
            position + CHILDREN_SIZE
        }
    }

    /// Stored (possibly encrypted) key bytes of slot `index`.
    pub fn key_bytes<C: KeyCodec>(&self, index: usize, keys: &KeySerializer<'_, C>) -> Result<&[u8]> {
        let offset = self.key_offset(index);
        let tail = self.page.tail(offset);
        let len = keys.raw_len(tail)?;
        Ok(&tail[..len])
    }

    pub fn get_key<C: KeyCodec>(&self, index: usize, keys: &KeySerializer<'_, C>) -> Result<C::Key> {
        keys.decode(self.key_bytes(index, keys)?)
    }

    /// Value of leaf slot `index`.
    pub fn get_value<C: KeyCodec>(&self, index: usize, keys: &KeySerializer<'_, C>) -> Result<Rid> {
        let offset = self.key_offset(index) + self.key_bytes(index, keys)?.len();
        if offset + Rid::SIZE > self.page.size() {
            return Err(Error::Codec(format!("value of slot {index} overruns the page")));
        }
        Ok(Rid::from_bytes(self.page.get_bytes(offset, Rid::SIZE)))
    }

    /// Size in bytes of the entry at `index`.
    pub fn entry_size<C: KeyCodec>(&self, index: usize, keys: &KeySerializer<'_, C>) -> Result<usize> {
        let key_len = self.key_bytes(index, keys)?.len();
        Ok(if self.is_leaf() {
            key_len + Rid::SIZE
        } else {
            key_len + CHILDREN_SIZE
        })
    }

    /// The whole entry at `index` as stored.
    pub fn get_raw_entry<C: KeyCodec>(&self, index: usize, keys: &KeySerializer<'_, C>) -> Result<Vec<u8>> {
        let len = self.entry_size(index, keys)?;
        Ok(self.page.get_bytes(self.position(index), len).to_vec())
    }

    pub fn get_left(&self, index: usize) -> PageId {
        PageId(self.page.get_i32(self.position(index)) as u32)
    }

    pub fn get_right(&self, index: usize) -> PageId {
        PageId(self.page.get_i32(self.position(index) + 4) as u32)
    }

    /// Child at child position `pos` (`0..=size`) of an internal bucket.
    ///
    /// # Panics
    /// Panics on an empty bucket.
    pub fn child(&self, pos: usize) -> PageId {
        let size = self.size();
        if pos < size {
            self.get_left(pos)
        } else {
            self.get_right(size - 1)
        }
    }
}

impl<P: DerefMut<Target = Page>> Bucket<P> {
    /// Reset to an empty bucket.
    pub fn init(&mut self, is_leaf: bool) {
        let page_size = self.page.size();
        self.page.set_page_type(PageType::Bucket);
        self.page.set_i32(FREE_POINTER_OFFSET, page_size as i32);
        self.page.set_i32(SIZE_OFFSET, 0);
        self.page.set_i8(IS_LEAF_OFFSET, i8::from(is_leaf));
        self.page.set_i64(LEFT_SIBLING_OFFSET, -1);
        self.page.set_i64(RIGHT_SIBLING_OFFSET, -1);
    }

    pub fn set_left_sibling(&mut self, page: Option<PageId>) {
        self.page.set_i64(LEFT_SIBLING_OFFSET, PageId::to_stored(page));
    }

    pub fn set_right_sibling(&mut self, page: Option<PageId>) {
        self.page.set_i64(RIGHT_SIBLING_OFFSET, PageId::to_stored(page));
    }

    pub fn set_left(&mut self, index: usize, page: PageId) {
        let position = self.position(index);
        self.page.set_i32(position, page.0 as i32);
    }

    pub fn set_right(&mut self, index: usize, page: PageId) {
        let position = self.position(index);
        self.page.set_i32(position + 4, page.0 as i32);
    }

    fn set_size(&mut self, size: usize) {
        self.page.set_i32(SIZE_OFFSET, size as i32);
    }

    fn set_free_pointer(&mut self, free: usize) {
        self.page.set_i32(FREE_POINTER_OFFSET, free as i32);
    }

    /// Reserve `entry_size` bytes for a new slot at `index`.
    ///
    /// Returns the offset of the reserved bytes, or None if the entry plus
    /// its position slot do not fit.
    fn reserve(&mut self, index: usize, entry_size: usize) -> Option<usize> {
        let size = self.size();
        let free = self.free_pointer();
        if free < entry_size || free - entry_size < (size + 1) * 4 + POSITIONS_OFFSET {
            return None;
        }

        let slot = POSITIONS_OFFSET + index * 4;
        self.page.move_bytes(slot, slot + 4, (size - index) * 4);

        let free = free - entry_size;
        self.page.set_i32(slot, free as i32);
        self.set_free_pointer(free);
        self.set_size(size + 1);
        Some(free)
    }

    /// Insert a leaf entry at `index`; false when the bucket is full.
    #[must_use]
    pub fn add_leaf_entry(&mut self, index: usize, key: &[u8], value: &[u8]) -> bool {
        match self.reserve(index, key.len() + value.len()) {
            Some(offset) => {
                self.page.set_bytes(offset, key);
                self.page.set_bytes(offset + key.len(), value);
                true
            }
            None => false,
        }
    }

    /// Insert an internal entry at `index`; false when the bucket is full.
    ///
    /// With `update_neighbors` the next entry's left child becomes `right`
    /// and the previous entry's right child becomes `left`.
    #[must_use]
    pub fn add_internal_entry(
        &mut self,
        index: usize,
        left: PageId,
        right: PageId,
        key: &[u8],
        update_neighbors: bool,
    ) -> bool {
        let Some(offset) = self.reserve(index, CHILDREN_SIZE + key.len()) else {
            return false;
        };
        self.page.set_i32(offset, left.0 as i32);
        self.page.set_i32(offset + 4, right.0 as i32);
        self.page.set_bytes(offset + CHILDREN_SIZE, key);

        if update_neighbors {
            if index + 1 < self.size() {
                self.set_left(index + 1, right);
            }
            if index > 0 {
                self.set_right(index - 1, left);
            }
        }
        true
    }

    /// Append an already encoded entry after the last slot.
    #[must_use]
    fn append_raw(&mut self, entry: &[u8]) -> bool {
        let index = self.size();
        match self.reserve(index, entry.len()) {
            Some(offset) => {
                self.page.set_bytes(offset, entry);
                true
            }
            None => false,
        }
    }

    /// Append encoded entries in order, as returned by [`Bucket::get_raw_entry`].
    pub fn add_all(&mut self, entries: &[Vec<u8>]) -> Result<()> {
        for entry in entries {
            if !self.append_raw(entry) {
                return Err(Error::Codec(format!(
                    "{} entries do not fit into an empty bucket",
                    entries.len()
                )));
            }
        }
        Ok(())
    }

    /// Drop slot `index` whose entry occupies `entry_size` bytes and close the gap.
    fn remove_entry(&mut self, index: usize, entry_size: usize) {
        let size = self.size();
        let free = self.free_pointer();
        let entry_position = self.position(index);

        // Entries below the removed one slide up by its size
        self.page.move_bytes(free, free + entry_size, entry_position - free);

        let slot = POSITIONS_OFFSET + index * 4;
        self.page.move_bytes(slot + 4, slot, (size - index - 1) * 4);
        self.set_size(size - 1);
        self.set_free_pointer(free + entry_size);

        for i in 0..size - 1 {
            let position = self.position(i);
            if position < entry_position {
                self.page
                    .set_i32(POSITIONS_OFFSET + i * 4, (position + entry_size) as i32);
            }
        }
    }

    pub fn remove_leaf_entry<C: KeyCodec>(&mut self, index: usize, keys: &KeySerializer<'_, C>) -> Result<()> {
        let entry_size = self.entry_size(index, keys)?;
        self.remove_entry(index, entry_size);
        Ok(())
    }

    /// Remove internal slot `index`; its left child takes over the
    /// following entry's left pointer.
    pub fn remove_internal_entry<C: KeyCodec>(&mut self, index: usize, keys: &KeySerializer<'_, C>) -> Result<()> {
        let entry_size = self.entry_size(index, keys)?;
        let left = self.get_left(index);
        self.remove_entry(index, entry_size);
        if index < self.size() {
            self.set_left(index, left);
        }
        Ok(())
    }

    /// Overwrite the value of leaf slot `index`.
    pub fn update_value<C: KeyCodec>(&mut self, index: usize, value: &Rid, keys: &KeySerializer<'_, C>) -> Result<()> {
        let offset = self.key_offset(index) + self.key_bytes(index, keys)?.len();
        self.page.set_bytes(offset, &value.to_bytes());
        Ok(())
    }

    /// Keep the first `new_size` entries and repack them.
    pub fn shrink<C: KeyCodec>(&mut self, new_size: usize, keys: &KeySerializer<'_, C>) -> Result<()> {
        let kept = (0..new_size)
            .map(|i| self.get_raw_entry(i, keys))
            .collect::<Result<Vec<_>>>()?;

        let page_size = self.page.size();
        self.set_free_pointer(page_size);
        self.set_size(0);
        self.add_all(&kept)
    }

    /// Flip leaf to internal or back.
    ///
    /// # Panics
    /// Panics if the bucket holds entries.
    pub fn switch_bucket_type(&mut self) {
        assert!(self.is_empty(), "bucket type can only change while empty");
        let is_leaf = self.is_leaf();
        self.page.set_i8(IS_LEAF_OFFSET, i8::from(!is_leaf));
    }
}

/// Number of internal entries with `max_key_size` keys that fit in a page.
pub fn internal_capacity(page_size: usize, max_key_size: usize) -> usize {
    page_size.saturating_sub(POSITIONS_OFFSET) / (max_key_size + CHILDREN_SIZE + 4)
}

// ============================================================================
// TESTS
// ============================================================================
