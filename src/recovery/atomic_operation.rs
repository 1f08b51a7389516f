//! Atomic operation - the unit of durability for page changes.
//!
//! Pages loaded for write are private shadow copies. Readers of the store
//! keep seeing the committed state until [`DurableStore::run_in_atomic_unit`]
//! logs the shadows and installs them into the buffer pools. Dropping an
//! operation without committing discards every change.
//!
//! [`DurableStore::run_in_atomic_unit`]: super::DurableStore::run_in_atomic_unit

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use crate::buffer::PageReadGuard;
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::page::Page;

use super::DurableStore;

/// Exclusive pin on a shadow page of an atomic operation.
pub type ShadowPage = ArcMutexGuard<RawMutex, Page>;

/// Shared pin returned by [`AtomicOperation::load_page_for_read`].
///
/// Pages the operation already modified are read from its shadow copy,
/// everything else straight from the buffer pool.
pub enum PageView<'s> {
    Cached(PageReadGuard<'s>),
    Shadow(ShadowPage),
}

impl Deref for PageView<'_> {
    type Target = Page;

    fn deref(&self) -> &Page {
        match self {
            PageView::Cached(guard) => guard,
            PageView::Shadow(guard) => guard,
        }
    }
}

/// Page changes collected by one `run_in_atomic_unit` call.
pub struct AtomicOperation<'s> {
    store: &'s DurableStore,
    operation_id: u64,
    changes: BTreeMap<(FileId, PageId), Arc<Mutex<Page>>>,
}

impl<'s> AtomicOperation<'s> {
    pub(crate) fn new(store: &'s DurableStore, operation_id: u64) -> Self {
        Self {
            store,
            operation_id,
            changes: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn operation_id(&self) -> u64 {
        self.operation_id
    }

    /// Pin a page for reading, seeing this operation's own changes.
    ///
    /// # Errors
    /// `Error::PagePinned` if the operation currently holds the page for write.
    pub fn load_page_for_read(&self, file: FileId, page_id: PageId) -> Result<PageView<'s>> {
        match self.changes.get(&(file, page_id)) {
            Some(shadow) => shadow
                .try_lock_arc()
                .map(PageView::Shadow)
                .ok_or(Error::PagePinned(page_id.0)),
            None => Ok(PageView::Cached(self.store.read_page(file, page_id)?)),
        }
    }

    /// Pin a page for writing.
    ///
    /// The first write pin copies the committed page into a shadow; later
    /// pins of the same page return the same shadow.
    ///
    /// # Errors
    /// `Error::PagePinned` if the page is already pinned for write.
    pub fn load_page_for_write(&mut self, file: FileId, page_id: PageId) -> Result<ShadowPage> {
        if let Some(shadow) = self.changes.get(&(file, page_id)) {
            return shadow.try_lock_arc().ok_or(Error::PagePinned(page_id.0));
        }

        let copy = self.store.read_page(file, page_id)?.duplicate();
        Ok(self.register(file, page_id, copy))
    }

    /// Append a zeroed page to `file` and pin it for writing.
    ///
    /// The file grows right away; if the operation is rolled back the page
    /// stays behind as a zero page.
    pub fn add_page(&mut self, file: FileId) -> Result<(PageId, ShadowPage)> {
        let pool = self.store.pool(file)?;
        let page_id = pool.allocate_page_id()?;
        let page = Page::new(pool.page_size());
        tracing::debug!("operation {} allocated {page_id} in {file}", self.operation_id);
        Ok((page_id, self.register(file, page_id, page)))
    }

    /// Number of pages in `file`, including pages added by this operation.
    pub fn page_count(&self, file: FileId) -> Result<u32> {
        Ok(self.store.pool(file)?.disk_page_count())
    }

    /// Whether this operation holds a shadow of the page.
    pub fn is_modified(&self, file: FileId, page_id: PageId) -> bool {
        self.changes.contains_key(&(file, page_id))
    }

    fn register(&mut self, file: FileId, page_id: PageId, page: Page) -> ShadowPage {
        let shadow = Arc::new(Mutex::new(page));
        let guard = shadow.lock_arc();
        self.changes.insert((file, page_id), shadow);
        guard
    }

    /// Hand the shadows over for commit, in (file, page) order.
    pub(crate) fn into_changes(self) -> Result<Vec<(FileId, PageId, Page)>> {
        self.changes
            .into_iter()
            .map(|((file, page_id), shadow)| {
                Arc::try_unwrap(shadow)
                    .map(|mutex| (file, page_id, mutex.into_inner()))
                    .map_err(|_| Error::PagePinned(page_id.0))
            })
            .collect()
    }
}
