//! Write-Ahead Log (WAL) of page after-images.
//!
//! Every atomic operation that modified pages appends one `PageImage`
//! record per page followed by a `Commit` record. A page change is durable
//! once its commit record is on disk; recovery replays the images of
//! committed operations and drops the rest.
//!
//! # File Layout
//! ```text
//! +-----------+------------------------------------------+
//! | 0-3       | magic "CBTW"                              |
//! | 4-11      | next_lsn at last truncation               |
//! | 12-...    | log records                               |
//! +-----------+------------------------------------------+
//! ```
//!
//! # Log Record Format
//! ```text
//! +----------+--------------------------------------------------+
//! | 0-3      | record_length (4 bytes, includes header+payload) |
//! | 4        | record_type (1 byte)                             |
//! | 5-12     | operation_id (8 bytes)                           |
//! | 13-20    | lsn (8 bytes) - Log Sequence Number              |
//! | 21-N     | payload (variable, depends on type)              |
//! | N-N+3    | CRC32 checksum (4 bytes)                         |
//! +----------+--------------------------------------------------+
//! ```
//! The checksum covers everything before it in the record.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::{Error, FileId, PageId, Result};

/// Log Sequence Number - monotonically increasing identifier for log records.
pub type Lsn = u64;

const FILE_MAGIC: [u8; 4] = *b"CBTW";

/// Size of the file header (magic + next LSN).
const FILE_HEADER_SIZE: u64 = 12;

/// `record_length` (4) + `record_type` (1) + `operation_id` (8) + lsn (8)
const RECORD_HEADER_SIZE: usize = 21;

/// CRC32 checksum size at end of record.
const CHECKSUM_SIZE: usize = 4;

/// Log record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Full after-image of one page.
    PageImage = 0x01,
    /// Atomic operation commit marker.
    Commit = 0x02,
}

impl TryFrom<u8> for LogRecordType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::PageImage),
            0x02 => Ok(Self::Commit),
            _ => Err(value),
        }
    }
}

/// Payload for the different log record types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecordPayload {
    /// A page of `file_id` as it must look after the operation.
    PageImage {
        file_id: FileId,
        page_id: PageId,
        image: Vec<u8>,
    },
    Commit,
}

impl LogRecordPayload {
    #[must_use]
    pub const fn record_type(&self) -> LogRecordType {
        match self {
            Self::PageImage { .. } => LogRecordType::PageImage,
            Self::Commit => LogRecordType::Commit,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::PageImage {
                file_id,
                page_id,
                image,
            } => {
                out.extend_from_slice(&file_id.0.to_le_bytes());
                out.extend_from_slice(&page_id.0.to_le_bytes());
                out.extend_from_slice(image);
            }
            Self::Commit => {}
        }
    }

    fn decode(record_type: LogRecordType, payload: &[u8]) -> Result<Self> {
        match record_type {
            LogRecordType::PageImage => {
                if payload.len() < 8 {
                    return Err(Error::WalCorrupted(format!(
                        "page image payload of {} bytes",
                        payload.len()
                    )));
                }
                let mut file_id = [0u8; 4];
                file_id.copy_from_slice(&payload[..4]);
                let mut page_id = [0u8; 4];
                page_id.copy_from_slice(&payload[4..8]);
                Ok(Self::PageImage {
                    file_id: FileId(u32::from_le_bytes(file_id)),
                    page_id: PageId(u32::from_le_bytes(page_id)),
                    image: payload[8..].to_vec(),
                })
            }
            LogRecordType::Commit => Ok(Self::Commit),
        }
    }
}

/// One decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub operation_id: u64,
    pub lsn: Lsn,
    pub payload: LogRecordPayload,
}

impl LogRecord {
    /// Append the framed record to `out`.
    fn encode_into(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&[0u8; 4]);
        out.push(self.payload.record_type() as u8);
        out.extend_from_slice(&self.operation_id.to_le_bytes());
        out.extend_from_slice(&self.lsn.to_le_bytes());
        self.payload.encode_into(out);

        let length = (out.len() - start + CHECKSUM_SIZE) as u32;
        out[start..start + 4].copy_from_slice(&length.to_le_bytes());
        let checksum = crc32fast::hash(&out[start..]);
        out.extend_from_slice(&checksum.to_le_bytes());
    }

    /// Decode the record at the start of `buf`.
    ///
    /// Returns `None` for a truncated or damaged record, which marks the end
    /// of the usable log.
    fn decode(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < RECORD_HEADER_SIZE + CHECKSUM_SIZE {
            return None;
        }
        let length = u32::from_le_bytes(buf[..4].try_into().ok()?) as usize;
        if length < RECORD_HEADER_SIZE + CHECKSUM_SIZE || length > buf.len() {
            return None;
        }

        let body = &buf[..length - CHECKSUM_SIZE];
        let stored = u32::from_le_bytes(buf[length - CHECKSUM_SIZE..length].try_into().ok()?);
        if crc32fast::hash(body) != stored {
            return None;
        }

        let record_type = LogRecordType::try_from(body[4]).ok()?;
        let operation_id = u64::from_le_bytes(body[5..13].try_into().ok()?);
        let lsn = u64::from_le_bytes(body[13..21].try_into().ok()?);
        let payload = LogRecordPayload::decode(record_type, &body[RECORD_HEADER_SIZE..]).ok()?;

        Some((
            Self {
                operation_id,
                lsn,
                payload,
            },
            length,
        ))
    }
}

/// Append-only log file owned by one durable store.
pub struct WriteAheadLog {
    file: File,
    path: PathBuf,
    next_lsn: Lsn,
    /// Bytes on disk, header included.
    size: u64,
    /// Encoded records not yet written.
    pending: Vec<u8>,
}

impl WriteAheadLog {
    /// Create an empty log file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let mut wal = Self {
            file,
            path: path.as_ref().to_path_buf(),
            next_lsn: 1,
            size: 0,
            pending: Vec::new(),
        };
        wal.truncate()?;
        Ok(wal)
    }

    /// Open an existing log file; call [`WriteAheadLog::read_all`] to replay it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let size = file.metadata()?.len();
        if size < FILE_HEADER_SIZE {
            return Err(Error::WalCorrupted(format!(
                "{} is shorter than its header",
                path.as_ref().display()
            )));
        }

        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;
        if header[..4] != FILE_MAGIC {
            return Err(Error::WalCorrupted(format!(
                "{} has a bad magic number",
                path.as_ref().display()
            )));
        }
        let mut next_lsn = [0u8; 8];
        next_lsn.copy_from_slice(&header[4..12]);

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            next_lsn: u64::from_le_bytes(next_lsn).max(1),
            size,
            pending: Vec::new(),
        })
    }

    /// LSN the next appended record will get.
    #[inline]
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn
    }

    /// Bytes on disk plus bytes still buffered.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size + self.pending.len() as u64
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer a record; it reaches the file on the next [`WriteAheadLog::flush`].
    pub fn append(&mut self, operation_id: u64, payload: LogRecordPayload) -> Lsn {
        let lsn = self.next_lsn;
        self.next_lsn += 1;
        LogRecord {
            operation_id,
            lsn,
            payload,
        }
        .encode_into(&mut self.pending);
        lsn
    }

    /// Write buffered records, optionally forcing them to stable storage.
    pub fn flush(&mut self, sync: bool) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            self.file.seek(SeekFrom::Start(self.size))?;
            self.file.write_all(&pending)?;
            self.size += pending.len() as u64;
        }
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Read every intact record from the start of the log.
    ///
    /// Reading stops at the first truncated or damaged record; whatever
    /// follows it was never acknowledged as committed.
    pub fn read_all(&mut self) -> Result<Vec<LogRecord>> {
        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(FILE_HEADER_SIZE))?;
        self.file.read_to_end(&mut buf)?;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            match LogRecord::decode(&buf[offset..]) {
                Some((record, length)) => {
                    self.next_lsn = self.next_lsn.max(record.lsn + 1);
                    records.push(record);
                    offset += length;
                }
                None => {
                    tracing::warn!(
                        "WAL {} has {} unreadable trailing bytes, ignoring them",
                        self.path.display(),
                        buf.len() - offset
                    );
                    break;
                }
            }
        }
        Ok(records)
    }

    /// Drop every record, keeping the LSN sequence going.
    pub fn truncate(&mut self) -> Result<()> {
        self.pending.clear();

        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        header[..4].copy_from_slice(&FILE_MAGIC);
        header[4..].copy_from_slice(&self.next_lsn.to_le_bytes());

        self.file.set_len(FILE_HEADER_SIZE)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.sync_all()?;
        self.size = FILE_HEADER_SIZE;
        Ok(())
    }
}
