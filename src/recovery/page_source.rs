//! Read access shared by committed state and atomic operations.

use std::ops::Deref;

use crate::buffer::PageReadGuard;
use crate::common::{FileId, PageId, Result};
use crate::recovery::{AtomicOperation, DurableStore, PageView};
use crate::storage::page::Page;

/// Anything pages can be read from.
///
/// Lookups run against a [`DurableStore`] directly; the same search code
/// runs inside an [`AtomicOperation`] and then sees its uncommitted changes.
pub trait PageSource {
    type Guard<'a>: Deref<Target = Page>
    where
        Self: 'a;

    fn read_page(&self, file: FileId, page_id: PageId) -> Result<Self::Guard<'_>>;

    fn page_count(&self, file: FileId) -> Result<u32>;
}

impl PageSource for DurableStore {
    type Guard<'a> = PageReadGuard<'a>;

    fn read_page(&self, file: FileId, page_id: PageId) -> Result<PageReadGuard<'_>> {
        DurableStore::read_page(self, file, page_id)
    }

    fn page_count(&self, file: FileId) -> Result<u32> {
        DurableStore::page_count(self, file)
    }
}

impl<'s> PageSource for AtomicOperation<'s> {
    type Guard<'a> = PageView<'s> where Self: 'a;

    fn read_page(&self, file: FileId, page_id: PageId) -> Result<PageView<'s>> {
        self.load_page_for_read(file, page_id)
    }

    fn page_count(&self, file: FileId) -> Result<u32> {
        AtomicOperation::page_count(self, file)
    }
}
