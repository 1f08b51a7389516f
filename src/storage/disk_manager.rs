//! Disk Manager - low-level file I/O for index pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages (with checksum stamping and verification)
//! - Allocating new pages
//! - Flushing the file to stable storage

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// Pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0     P        2P       ...      N×P
/// ```
///
/// Page N is located at file offset `N × page_size`.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// Writes are not synced individually. Committed changes are protected by
/// the write-ahead log until a checkpoint calls [`DiskManager::sync`].
pub struct DiskManager {
    file: File,
    path: PathBuf,
    page_size: usize,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new index file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_size,
            page_count: 0,
        })
    }

    /// Open an existing index file.
    ///
    /// A trailing partial page (torn allocation) is ignored and will be
    /// overwritten by the next allocation.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        let file_size = file.metadata()?.len();
        let page_count = u32::try_from(file_size / page_size as u64)
            .map_err(|_| Error::InvalidConfig(format!("file of {file_size} bytes is too large")))?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_size,
            page_count,
        })
    }

    /// Read a page from disk.
    ///
    /// Pages that have been written at least once carry a checksum which is
    /// verified here. Freshly allocated zero pages are returned as is.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist
    /// - `Error::ChecksumMismatch` if the stored checksum is wrong
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        let mut page = Page::new(self.page_size);
        self.file.read_exact(page.as_mut_slice())?;

        if page.page_type() != PageType::Invalid && !page.verify_checksum() {
            return Err(Error::ChecksumMismatch {
                page_id: page_id.0,
                stored: page.header().checksum,
                computed: PageHeader::compute_checksum(page.as_slice()),
            });
        }

        Ok(page)
    }

    /// Write a page to disk, stamping its checksum on the way out.
    ///
    /// The in-memory page is left untouched.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        debug_assert_eq!(page.size(), self.page_size);

        let mut out = page.duplicate();
        out.update_checksum();

        self.file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        self.file.write_all(out.as_slice())?;
        Ok(())
    }

    /// Allocate a new zeroed page at the end of the file.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);

        self.file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        self.file.write_all(&vec![0u8; self.page_size])?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Grow the file with zero pages until `page_id` exists.
    pub fn ensure_page(&mut self, page_id: PageId) -> Result<()> {
        while self.page_count <= page_id.0 {
            self.allocate_page()?;
        }
        Ok(())
    }

    /// Flush file contents to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        PageId::new(self.page_count).offset(self.page_size)
    }
}
