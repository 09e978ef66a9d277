//! Scoped pin handles. A guard pins its page on acquisition and releases
//! exactly one pin on drop; the read/write variants additionally hold the
//! page's latch for the guard's lifetime.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};

use crate::buffer::BufferPoolManager;
use crate::page::Page;
use crate::PageId;

/// Holds a pin on a page without latching its bytes.
///
/// Moving the guard transfers the pin; the drop releases it once, passing
/// along whatever dirtiness the guard accumulated.
pub struct BasicPageGuard {
    pool: Option<BufferPoolManager>,
    page_id: PageId,
    buffer: Arc<RwLock<Page>>,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(pool: BufferPoolManager, page_id: PageId, buffer: Arc<RwLock<Page>>) -> Self {
        Self {
            pool: Some(pool),
            page_id,
            buffer,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Acquires the page's shared latch, keeping the pin.
    ///
    /// Blocks until no writer holds the latch.
    pub fn upgrade_read(self) -> ReadPageGuard {
        let latch = self.buffer.read_arc();
        ReadPageGuard { latch, guard: self }
    }

    /// Acquires the page's exclusive latch, keeping the pin.
    ///
    /// The page is unpinned dirty when the write guard is released.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let latch = self.buffer.write_arc();
        self.is_dirty = true;
        WritePageGuard { latch, guard: self }
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.unpin_page(self.page_id, self.is_dirty);
        }
    }
}

/// Shared access to a pinned page's bytes.
///
/// The latch (declared first) is released before the pin.
pub struct ReadPageGuard {
    latch: ArcRwLockReadGuard<RawRwLock, Page>,
    guard: BasicPageGuard,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }
}

impl Deref for ReadPageGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        &self.latch
    }
}

/// Exclusive access to a pinned page's bytes.
pub struct WritePageGuard {
    latch: ArcRwLockWriteGuard<RawRwLock, Page>,
    guard: BasicPageGuard,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }
}

impl Deref for WritePageGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        &self.latch
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.latch
    }
}
