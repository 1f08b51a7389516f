//! Entry point - page 0 of the primary index file.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    page header
//! 13      1     key serializer id (i8)
//! 14      4     key size (i32): components per key
//! 18      8     tree size (i64): stored keys, null key included
//! 26      4     pages size (i32): highest page id handed out to the tree
//! ```

use std::ops::{Deref, DerefMut};

use crate::storage::page::{Page, PageHeader, PageType};

const KEY_SERIALIZER_OFFSET: usize = PageHeader::SIZE;
const KEY_SIZE_OFFSET: usize = KEY_SERIALIZER_OFFSET + 1;
const TREE_SIZE_OFFSET: usize = KEY_SIZE_OFFSET + 4;
const PAGES_SIZE_OFFSET: usize = TREE_SIZE_OFFSET + 8;

pub struct EntryPoint<P> {
    page: P,
}

impl<P: Deref<Target = Page>> EntryPoint<P> {
    pub fn new(page: P) -> Self {
        Self { page }
    }

    pub fn is_initialized(&self) -> bool {
        self.page.page_type() == PageType::EntryPoint
    }

    pub fn key_serializer_id(&self) -> u8 {
        self.page.get_u8(KEY_SERIALIZER_OFFSET)
    }

    pub fn key_size(&self) -> usize {
        self.page.get_i32(KEY_SIZE_OFFSET).max(0) as usize
    }

    pub fn tree_size(&self) -> u64 {
        self.page.get_i64(TREE_SIZE_OFFSET).max(0) as u64
    }

    pub fn pages_size(&self) -> u32 {
        self.page.get_i32(PAGES_SIZE_OFFSET).max(0) as u32
    }
}

impl<P: DerefMut<Target = Page>> EntryPoint<P> {
    /// Fresh entry point: empty tree, root leaf at page 1.
    pub fn init(&mut self, key_serializer_id: u8, key_size: usize) {
        self.page.set_page_type(PageType::EntryPoint);
        self.page.set_u8(KEY_SERIALIZER_OFFSET, key_serializer_id);
        self.page.set_i32(KEY_SIZE_OFFSET, key_size as i32);
        self.set_tree_size(0);
        self.set_pages_size(1);
    }

    pub fn set_tree_size(&mut self, size: u64) {
        self.page.set_i64(TREE_SIZE_OFFSET, size as i64);
    }

    pub fn set_pages_size(&mut self, pages: u32) {
        self.page.set_i32(PAGES_SIZE_OFFSET, pages as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_and_counters() {
        let mut entry = EntryPoint::new(Box::new(Page::new(128)));
        assert!(!entry.is_initialized());

        entry.init(4, 2);
        assert!(entry.is_initialized());
        assert_eq!(entry.key_serializer_id(), 4);
        assert_eq!(entry.key_size(), 2);
        assert_eq!(entry.tree_size(), 0);
        assert_eq!(entry.pages_size(), 1);

        entry.set_tree_size(1_000_000);
        entry.set_pages_size(77);
        assert_eq!(entry.tree_size(), 1_000_000);
        assert_eq!(entry.pages_size(), 77);
    }

    #[test]
    fn test_field_offsets() {
        let mut page = Page::new(128);
        {
            let mut entry = EntryPoint::new(&mut page);
            entry.init(1, 1);
            entry.set_tree_size(5);
        }
        assert_eq!(page.get_i8(13), 1);
        assert_eq!(page.get_i32(14), 1);
        assert_eq!(page.get_i64(18), 5);
        assert_eq!(page.get_i32(26), 1);
    }
}
