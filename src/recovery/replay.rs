//! Crash recovery: replay committed page images from the WAL.
//!
//! # Recovery Process
//!
//! 1. Scan the WAL up to the first damaged record
//! 2. Buffer page images per atomic operation
//! 3. On a `Commit` record, write that operation's images to the data files
//! 4. Discard operations that never committed
//! 5. Sync the data files and truncate the WAL
//!
//! Images are full pages, so replaying an operation twice is harmless.

use std::collections::HashMap;

use crate::common::{Error, FileId, PageId, Result};
use crate::recovery::wal::{LogRecordPayload, WriteAheadLog};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Result of a recovery run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of WAL records scanned.
    pub records_scanned: usize,
    /// Number of committed atomic operations replayed.
    pub operations_replayed: usize,
    /// Number of uncommitted atomic operations discarded.
    pub operations_discarded: usize,
    /// Number of page images written to the data files.
    pub pages_written: usize,
}

/// Replay `wal` into `disks`, indexed by [`FileId`].
pub fn recover(wal: &mut WriteAheadLog, disks: &mut [DiskManager]) -> Result<RecoveryResult> {
    let records = wal.read_all()?;
    let mut result = RecoveryResult {
        records_scanned: records.len(),
        ..RecoveryResult::default()
    };

    if records.is_empty() {
        return Ok(result);
    }

    let mut pending: HashMap<u64, Vec<(FileId, PageId, Vec<u8>)>> = HashMap::new();

    for record in records {
        match record.payload {
            LogRecordPayload::PageImage {
                file_id,
                page_id,
                image,
            } => {
                pending
                    .entry(record.operation_id)
                    .or_default()
                    .push((file_id, page_id, image));
            }
            LogRecordPayload::Commit => {
                let images = pending.remove(&record.operation_id).unwrap_or_default();
                for (file_id, page_id, image) in images {
                    apply_image(disks, file_id, page_id, image)?;
                    result.pages_written += 1;
                }
                result.operations_replayed += 1;
            }
        }
    }
    result.operations_discarded = pending.len();

    for disk in disks.iter_mut() {
        disk.sync()?;
    }
    wal.truncate()?;

    tracing::info!(
        "recovered {} from WAL: {} operations replayed, {} discarded, {} pages written",
        wal.path().display(),
        result.operations_replayed,
        result.operations_discarded,
        result.pages_written
    );
    Ok(result)
}

fn apply_image(
    disks: &mut [DiskManager],
    file_id: FileId,
    page_id: PageId,
    image: Vec<u8>,
) -> Result<()> {
    let disk = disks
        .get_mut(file_id.index())
        .ok_or_else(|| Error::WalCorrupted(format!("image for unknown {file_id}")))?;
    if image.len() != disk.page_size() {
        return Err(Error::WalCorrupted(format!(
            "image of {page_id} in {file_id} has {} bytes, expected {}",
            image.len(),
            disk.page_size()
        )));
    }

    let mut page = Page::new(disk.page_size());
    page.as_mut_slice().copy_from_slice(&image);
    disk.ensure_page(page_id)?;
    disk.write_page(page_id, &page)
}
