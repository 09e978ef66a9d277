use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::trace;
use parking_lot::{Mutex, RwLock};

use crate::guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use crate::page::Page;
use crate::replacer::{FrameId, LRUKReplacer, Replacer};
use crate::scheduler::{DiskRequest, DiskScheduler};
use crate::{DiskManager, PageId};

#[derive(Debug, Default)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    is_dirty: bool,
}

struct BufferPoolState {
    frames: Vec<FrameMeta>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    free_page_ids: VecDeque<PageId>,
    next_page_id: PageId,
    replacer: LRUKReplacer,
    scheduler: DiskScheduler,
}

/// Buffer pool manager caching fixed-size pages between disk and memory.
///
/// One lock guards all bookkeeping: the page table, the free lists, pin
/// counts and the replacer. Page bytes live outside it, each frame under its
/// own reader/writer latch, shared with the guards handed to clients. The
/// lock is held across disk completion waits; releasing it there would
/// require re-validating the page table after wake-up, which this design
/// deliberately avoids.
#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<Mutex<BufferPoolState>>,
    buffers: Arc<[Arc<RwLock<Page>>]>,
}

impl BufferPoolManager {
    /// Creates a pool with `pool_size` frames and an LRU-K replacer of depth
    /// `replacer_k`, taking ownership of the disk manager.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: DiskManager) -> Self {
        let buffers: Arc<[Arc<RwLock<Page>>]> = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Page::new())))
            .collect();
        let state = BufferPoolState {
            frames: (0..pool_size).map(|_| FrameMeta::default()).collect(),
            page_table: HashMap::new(),
            free_list: (0..pool_size).collect(),
            free_page_ids: VecDeque::new(),
            next_page_id: 0,
            replacer: LRUKReplacer::new(pool_size, replacer_k),
            scheduler: DiskScheduler::new(disk_manager),
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
            buffers,
        }
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.inner.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(state.frames[frame_id].pin_count)
    }

    /// Allocates a fresh page, pinned at 1 with zeroed contents.
    ///
    /// Returns `None` when every frame is pinned.
    pub fn new_page(&self) -> Option<BasicPageGuard> {
        let mut state = self.inner.lock();
        let frame_id = self.secure_frame(&mut state)?;
        let page_id = Self::allocate_page(&mut state);
        self.buffers[frame_id].write().reset();
        Self::install_frame(&mut state, frame_id, page_id);
        drop(state);
        Some(BasicPageGuard::new(
            self.clone(),
            page_id,
            Arc::clone(&self.buffers[frame_id]),
        ))
    }

    /// Pins the page, reading it from disk on a miss.
    ///
    /// Returns `None` when the page is not resident and every frame is
    /// pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Option<BasicPageGuard> {
        let mut state = self.inner.lock();
        let frame_id = if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].pin_count += 1;
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            frame_id
        } else {
            let frame_id = self.secure_frame(&mut state)?;
            let data = Arc::new(Mutex::new(Page::new()));
            let (promise, future) = DiskScheduler::create_promise();
            state.scheduler.schedule(DiskRequest {
                is_write: false,
                data: Arc::clone(&data),
                page_id,
                done: promise,
            });
            future.recv().expect("disk scheduler worker disconnected");
            *self.buffers[frame_id].write() = data.lock().clone();
            Self::install_frame(&mut state, frame_id, page_id);
            frame_id
        };
        drop(state);
        Some(BasicPageGuard::new(
            self.clone(),
            page_id,
            Arc::clone(&self.buffers[frame_id]),
        ))
    }

    /// Fetches a page and latches it for shared access.
    pub fn fetch_page_read(&self, page_id: PageId) -> Option<ReadPageGuard> {
        Some(self.fetch_page(page_id)?.upgrade_read())
    }

    /// Fetches a page and latches it for exclusive access.
    pub fn fetch_page_write(&self, page_id: PageId) -> Option<WritePageGuard> {
        Some(self.fetch_page(page_id)?.upgrade_write())
    }

    /// Releases one pin on the page, recording `is_dirty`.
    ///
    /// The dirty flag is sticky: once set it survives further clean unpins
    /// until a write-back clears it. Returns `false` if the page is not
    /// resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.inner.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        if state.frames[frame_id].pin_count == 0 {
            return false;
        }
        state.frames[frame_id].pin_count -= 1;
        if is_dirty {
            state.frames[frame_id].is_dirty = true;
        }
        if state.frames[frame_id].pin_count == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a resident page back to disk and clears its dirty flag.
    ///
    /// The write happens whether or not the page is dirty; flushing never
    /// evicts and never deallocates.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let mut state = self.inner.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        self.write_back(&mut state, frame_id, page_id);
        state.frames[frame_id].is_dirty = false;
        true
    }

    /// Writes every resident page back to disk.
    pub fn flush_all_pages(&self) {
        let mut state = self.inner.lock();
        let resident: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();
        for (page_id, frame_id) in resident {
            self.write_back(&mut state, frame_id, page_id);
            state.frames[frame_id].is_dirty = false;
        }
    }

    /// Drops a page from the pool and recycles its id.
    ///
    /// Deleting a non-resident page trivially succeeds; deleting a pinned
    /// page fails. Dirty contents are written back first.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.inner.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        if state.frames[frame_id].pin_count > 0 {
            return false;
        }
        if state.frames[frame_id].is_dirty {
            self.write_back(&mut state, frame_id, page_id);
            state.frames[frame_id].is_dirty = false;
        }
        state.replacer.remove(frame_id);
        state.page_table.remove(&page_id);
        state.frames[frame_id].page_id = None;
        self.buffers[frame_id].write().reset();
        state.free_list.push_back(frame_id);
        Self::deallocate_page(&mut state, page_id);
        true
    }

    /// Hands out a page id, preferring previously deallocated ones.
    fn allocate_page(state: &mut BufferPoolState) -> PageId {
        if let Some(page_id) = state.free_page_ids.pop_front() {
            return page_id;
        }
        let page_id = state.next_page_id;
        state.next_page_id += 1;
        page_id
    }

    /// Returns a page id to the reuse pool.
    fn deallocate_page(state: &mut BufferPoolState, page_id: PageId) {
        state.free_page_ids.push_back(page_id);
    }

    /// Finds a frame to host a page: free list first, then eviction.
    ///
    /// A dirty victim is written back (awaited) before its page-table entry
    /// is dropped, so the write always precedes any read into the frame.
    fn secure_frame(&self, state: &mut BufferPoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        let frame_id = state.replacer.evict()?;
        if state.frames[frame_id].is_dirty {
            let page_id = state.frames[frame_id]
                .page_id
                .expect("dirty frame holds no page");
            trace!("evicting dirty page {} from frame {}", page_id, frame_id);
            self.write_back(state, frame_id, page_id);
            state.frames[frame_id].is_dirty = false;
        }
        if let Some(old_page_id) = state.frames[frame_id].page_id.take() {
            state.page_table.remove(&old_page_id);
        }
        Some(frame_id)
    }

    fn install_frame(state: &mut BufferPoolState, frame_id: FrameId, page_id: PageId) {
        let meta = &mut state.frames[frame_id];
        meta.page_id = Some(page_id);
        meta.pin_count = 1;
        meta.is_dirty = false;
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);
    }

    /// Schedules a write of the frame's current contents and awaits it.
    fn write_back(&self, state: &mut BufferPoolState, frame_id: FrameId, page_id: PageId) {
        let snapshot = Arc::new(Mutex::new(self.buffers[frame_id].read().clone()));
        let (promise, future) = DiskScheduler::create_promise();
        state.scheduler.schedule(DiskRequest {
            is_write: true,
            data: snapshot,
            page_id,
            done: promise,
        });
        future.recv().expect("disk scheduler worker disconnected");
    }
}
