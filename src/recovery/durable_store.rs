//! Durable store - the files of one index component and their WAL.
//!
//! A [`DurableStore`] owns one buffer pool per file plus a write-ahead log
//! shared by all of them, and is the only way to change a page:
//! [`DurableStore::run_in_atomic_unit`] either commits every page a closure
//! touched or none of them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::buffer::{BufferPoolManager, PageReadGuard};
use crate::common::{Error, FileId, IndexConfig, PageId, Result};
use crate::recovery::atomic_operation::AtomicOperation;
use crate::recovery::replay::{recover, RecoveryResult};
use crate::recovery::wal::{LogRecordPayload, WriteAheadLog};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Page files plus write-ahead log with all-or-nothing commits.
///
/// # Commit protocol
/// 1. The closure works on shadow copies (no uncommitted page ever reaches
///    a buffer pool, so nothing has to be undone)
/// 2. Each shadow gets a fresh LSN and is logged as a full page image
/// 3. A commit record is appended and the log is flushed (and fsynced)
/// 4. The images are copied into the buffer pools
///
/// If step 3 or 4 fails the log may hold a commit the pools only partly
/// reflect. The store is then poisoned: every later page access, commit and
/// checkpoint fails with [`Error::Poisoned`] and the log is left alone, so
/// reopening replays the commit in full.
///
/// # Checkpoints
/// Once the log outgrows the configured threshold, and on close, all pools
/// are flushed, the files synced and the log truncated.
pub struct DurableStore {
    pools: Vec<BufferPoolManager>,
    paths: Vec<PathBuf>,
    wal_path: PathBuf,
    wal: Mutex<WriteAheadLog>,
    poisoned: AtomicBool,
    next_operation_id: AtomicU64,
    sync_on_commit: bool,
    checkpoint_threshold: u64,
}

impl DurableStore {
    /// Create the page files and an empty log. Fails if any file exists.
    pub fn create(files: &[PathBuf], wal_path: &Path, config: &IndexConfig) -> Result<Self> {
        let disks = files
            .iter()
            .map(|path| DiskManager::create(path, config.page_size))
            .collect::<Result<Vec<_>>>()?;
        let wal = WriteAheadLog::create(wal_path)?;
        Ok(Self::assemble(files, disks, wal, config))
    }

    /// Open existing files, replaying committed work left in the log.
    pub fn open(files: &[PathBuf], wal_path: &Path, config: &IndexConfig) -> Result<(Self, RecoveryResult)> {
        let mut disks = files
            .iter()
            .map(|path| DiskManager::open(path, config.page_size))
            .collect::<Result<Vec<_>>>()?;
        let mut wal = WriteAheadLog::open(wal_path)?;
        let recovered = recover(&mut wal, &mut disks)?;
        Ok((Self::assemble(files, disks, wal, config), recovered))
    }

    fn assemble(
        files: &[PathBuf],
        disks: Vec<DiskManager>,
        wal: WriteAheadLog,
        config: &IndexConfig,
    ) -> Self {
        Self {
            pools: disks
                .into_iter()
                .map(|disk| BufferPoolManager::new(config.buffer_pool_frames, disk))
                .collect(),
            paths: files.to_vec(),
            wal_path: wal.path().to_path_buf(),
            wal: Mutex::new(wal),
            poisoned: AtomicBool::new(false),
            next_operation_id: AtomicU64::new(1),
            sync_on_commit: config.sync_on_commit,
            checkpoint_threshold: config.checkpoint_threshold,
        }
    }

    /// Whether a failed commit left the pools out of step with the log.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(Error::Poisoned(self.wal_path.display().to_string()));
        }
        Ok(())
    }

    /// Buffer pool of `file`.
    pub fn pool(&self, file: FileId) -> Result<&BufferPoolManager> {
        self.ensure_usable()?;
        self.pools
            .get(file.index())
            .ok_or_else(|| Error::InvalidConfig(format!("{file} is not part of this store")))
    }

    /// Pin a committed page for reading.
    pub fn read_page(&self, file: FileId, page_id: PageId) -> Result<PageReadGuard<'_>> {
        self.pool(file)?.fetch_page_read(page_id)
    }

    /// Number of pages in `file`.
    pub fn page_count(&self, file: FileId) -> Result<u32> {
        Ok(self.pool(file)?.disk_page_count())
    }

    /// Pins currently held across all pools.
    pub fn total_pins(&self) -> u32 {
        self.pools.iter().map(BufferPoolManager::total_pins).sum()
    }

    /// Run `f` as one atomic unit.
    ///
    /// If `f` returns `Err` nothing it did is kept (apart from zero pages
    /// appended by [`AtomicOperation::add_page`]). If it returns `Ok`, its
    /// page changes are logged and installed before this returns.
    pub fn run_in_atomic_unit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut AtomicOperation<'_>) -> Result<T>,
    {
        self.ensure_usable()?;
        let operation_id = self.next_operation_id.fetch_add(1, Ordering::Relaxed);
        let mut operation = AtomicOperation::new(self, operation_id);
        let value = f(&mut operation)?;
        self.commit(operation)?;
        Ok(value)
    }

    fn commit(&self, operation: AtomicOperation<'_>) -> Result<()> {
        let operation_id = operation.operation_id();
        let mut changes = operation.into_changes()?;
        if changes.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        for (file, page_id, page) in &mut changes {
            page.set_lsn(wal.next_lsn());
            wal.append(
                operation_id,
                LogRecordPayload::PageImage {
                    file_id: *file,
                    page_id: *page_id,
                    image: page.as_slice().to_vec(),
                },
            );
        }
        wal.append(operation_id, LogRecordPayload::Commit);
        if let Err(error) = wal
            .flush(self.sync_on_commit)
            .and_then(|()| self.install(&changes))
        {
            self.poisoned.store(true, Ordering::Release);
            tracing::error!(
                "commit of operation {operation_id} failed, {} must be reopened: {error}",
                self.wal_path.display()
            );
            return Err(error);
        }

        if wal.size() > self.checkpoint_threshold {
            self.checkpoint_locked(&mut wal)?;
        }
        Ok(())
    }

    fn install(&self, changes: &[(FileId, PageId, Page)]) -> Result<()> {
        for (file, page_id, page) in changes {
            let mut guard = self.pool(*file)?.fetch_page_write(*page_id)?;
            guard.copy_from(page);
        }
        Ok(())
    }

    /// Flush all pools, sync the files and truncate the log.
    pub fn checkpoint(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        self.checkpoint_locked(&mut wal)
    }

    fn checkpoint_locked(&self, wal: &mut WriteAheadLog) -> Result<()> {
        self.ensure_usable()?;
        wal.flush(false)?;
        for pool in &self.pools {
            pool.flush_all_pages()?;
            pool.sync()?;
        }
        let size = wal.size();
        wal.truncate()?;
        tracing::debug!("checkpoint of {} truncated {size} bytes", wal.path().display());
        Ok(())
    }

    /// Checkpoint and release the files.
    pub fn close(self) -> Result<()> {
        self.checkpoint()?;
        for (pool, path) in self.pools.iter().zip(&self.paths) {
            tracing::debug!("closed {}: {}", path.display(), pool.stats().snapshot());
        }
        Ok(())
    }

    /// Close and remove every file of the store, log included.
    pub fn destroy(self) -> Result<()> {
        let wal_path = self.wal_path.clone();
        let paths = self.paths.clone();
        drop(self);
        for path in paths.iter().chain(std::iter::once(&wal_path)) {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageType;
    use tempfile::tempdir;

    const DATA: FileId = FileId(0);
    const AUX: FileId = FileId(1);

    fn config() -> IndexConfig {
        IndexConfig::default().with_page_size(256).with_buffer_pool_frames(8)
    }

    fn paths(dir: &Path) -> (Vec<PathBuf>, PathBuf) {
        (
            vec![dir.join("s.cbt"), dir.join("s.nbt")],
            dir.join("s.wal"),
        )
    }

    #[test]
    fn test_commit_is_visible() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let store = DurableStore::create(&files, &wal, &config()).unwrap();

        let page_id = store
            .run_in_atomic_unit(|op| {
                let (page_id, mut page) = op.add_page(DATA)?;
                page.set_page_type(PageType::Bucket);
                page.set_i32(20, 7);
                Ok(page_id)
            })
            .unwrap();

        let page = store.read_page(DATA, page_id).unwrap();
        assert_eq!(page.get_i32(20), 7);
        assert!(page.lsn() > 0);
    }

    #[test]
    fn test_error_discards_changes() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let store = DurableStore::create(&files, &wal, &config()).unwrap();

        store
            .run_in_atomic_unit(|op| {
                let (_, mut page) = op.add_page(DATA)?;
                page.set_i32(20, 1);
                Ok(())
            })
            .unwrap();

        let result: Result<()> = store.run_in_atomic_unit(|op| {
            let mut page = op.load_page_for_write(DATA, PageId(0))?;
            page.set_i32(20, 2);
            Err(Error::Codec("abort".into()))
        });
        assert!(result.is_err());

        assert_eq!(store.read_page(DATA, PageId(0)).unwrap().get_i32(20), 1);
        assert_eq!(store.total_pins(), 0);
    }

    #[test]
    fn test_reads_inside_operation_see_own_writes() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let store = DurableStore::create(&files, &wal, &config()).unwrap();

        store
            .run_in_atomic_unit(|op| {
                let (page_id, mut page) = op.add_page(AUX)?;
                page.set_i64(30, 42);
                drop(page);

                assert!(op.is_modified(AUX, page_id));
                assert_eq!(op.load_page_for_read(AUX, page_id)?.get_i64(30), 42);
                assert_eq!(op.page_count(AUX)?, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_double_write_pin_is_rejected() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let store = DurableStore::create(&files, &wal, &config()).unwrap();

        let result = store.run_in_atomic_unit(|op| {
            let (page_id, _held) = op.add_page(DATA)?;
            op.load_page_for_write(DATA, page_id).map(|_| ())
        });
        assert!(matches!(result, Err(Error::PagePinned(0))));
    }

    #[test]
    fn test_reopen_replays_uncheckpointed_commits() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());

        {
            let store = DurableStore::create(&files, &wal, &config()).unwrap();
            store
                .run_in_atomic_unit(|op| {
                    let (_, mut a) = op.add_page(DATA)?;
                    a.set_page_type(PageType::Bucket);
                    a.set_i32(20, 5);
                    let (_, mut b) = op.add_page(AUX)?;
                    b.set_page_type(PageType::NullBucket);
                    b.set_i32(20, 6);
                    Ok(())
                })
                .unwrap();
            // Dropped without close: pages only live in the log
        }

        let (store, recovered) = DurableStore::open(&files, &wal, &config()).unwrap();
        assert_eq!(recovered.operations_replayed, 1);
        assert_eq!(store.read_page(DATA, PageId(0)).unwrap().get_i32(20), 5);
        assert_eq!(store.read_page(AUX, PageId(0)).unwrap().get_i32(20), 6);
    }

    #[test]
    fn test_checkpoint_truncates_log() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let config = config().with_checkpoint_threshold(1);

        {
            let store = DurableStore::create(&files, &wal, &config).unwrap();
            store
                .run_in_atomic_unit(|op| {
                    let (_, mut page) = op.add_page(DATA)?;
                    page.set_page_type(PageType::Bucket);
                    page.set_i32(20, 9);
                    Ok(())
                })
                .unwrap();
        }

        let (store, recovered) = DurableStore::open(&files, &wal, &config).unwrap();
        assert_eq!(recovered.records_scanned, 0);
        assert_eq!(store.read_page(DATA, PageId(0)).unwrap().get_i32(20), 9);
    }

    #[test]
    fn test_failed_install_poisons_until_reopen() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let config = config().with_buffer_pool_frames(2);

        {
            let store = DurableStore::create(&files, &wal, &config).unwrap();
            store
                .run_in_atomic_unit(|op| {
                    for value in 1..=3 {
                        let (_, mut page) = op.add_page(DATA)?;
                        page.set_page_type(PageType::Bucket);
                        page.set_i32(20, value);
                    }
                    Ok(())
                })
                .unwrap();

            // Both frames stay pinned, so installing a fourth page has nowhere to go
            let first = store.read_page(DATA, PageId(0)).unwrap();
            let second = store.read_page(DATA, PageId(1)).unwrap();
            let result = store.run_in_atomic_unit(|op| {
                let (page_id, mut page) = op.add_page(DATA)?;
                page.set_page_type(PageType::Bucket);
                page.set_i32(20, 4);
                Ok(page_id)
            });
            assert!(matches!(result, Err(Error::NoFreeFrames)));
            drop(first);
            drop(second);

            assert!(store.is_poisoned());
            assert!(matches!(store.read_page(DATA, PageId(0)), Err(Error::Poisoned(_))));
            assert!(matches!(
                store.run_in_atomic_unit(|_| Ok(())),
                Err(Error::Poisoned(_))
            ));
            assert!(matches!(store.close(), Err(Error::Poisoned(_))));
        }

        let (store, recovered) = DurableStore::open(&files, &wal, &config).unwrap();
        assert_eq!(recovered.operations_replayed, 2);
        assert!(!store.is_poisoned());
        assert_eq!(store.read_page(DATA, PageId(3)).unwrap().get_i32(20), 4);
        assert_eq!(store.read_page(DATA, PageId(0)).unwrap().get_i32(20), 1);
    }

    #[test]
    fn test_destroy_removes_files() {
        let dir = tempdir().unwrap();
        let (files, wal) = paths(dir.path());
        let store = DurableStore::create(&files, &wal, &config()).unwrap();

        store.destroy().unwrap();
        assert!(!files[0].exists());
        assert!(!files[1].exists());
        assert!(!wal.exists());
    }
}
