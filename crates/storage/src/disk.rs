//! DiskManager: page-granular file I/O.
//!
//! The disk manager knows nothing about allocation, caching or recovery; it
//! reads and writes fixed-size pages at `page_id * PAGE_SIZE` and that is
//! all. Page ids are handed out by the buffer pool.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use thiserror::Error;

pub type PageId = u64;
pub const PAGE_SIZE: usize = 4096;

/// Errors returned by the disk manager.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The underlying file operation failed.
    #[error("disk io error: {0}")]
    Io(#[from] std::io::Error),
    /// A caller-supplied buffer was not exactly one page long.
    #[error("buffer of {0} bytes does not match page size")]
    BufferSize(usize),
}

/// Convenience alias for disk manager results.
pub type DiskResult<T> = Result<T, DiskError>;

pub struct DiskManager {
    file: File,
}

impl DiskManager {
    /// Opens or creates the backing file.
    pub fn open<P: AsRef<Path>>(path: P) -> DiskResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self { file })
    }

    /// Reads the page at `page_id` into `buf`.
    ///
    /// A page that was never written reads back as whatever the caller left
    /// in `buf` past the end of the file; callers pass zeroed buffers.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DiskError::BufferSize(buf.len()));
        }
        let offset = page_id * PAGE_SIZE as u64;
        self.file.read_at(buf, offset)?;
        Ok(())
    }

    /// Writes the page at `page_id` from `buf`, extending the file if needed.
    pub fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> DiskResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DiskError::BufferSize(buf.len()));
        }
        let offset = page_id * PAGE_SIZE as u64;
        self.file.write_at(buf, offset)?;
        Ok(())
    }

    /// Forces buffered data to disk.
    pub fn sync_data(&self) -> DiskResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
