use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

/// Identifies a frame in the buffer pool.
pub type FrameId = usize;

/// Eviction policy for buffer pool frames.
///
/// Implementations are internally synchronized; the buffer pool calls them
/// while holding its own lock, but they are safe to use standalone.
pub trait Replacer {
    /// Records an access to the frame at the current logical timestamp.
    ///
    /// Panics if `frame_id` is out of range for the replacer.
    fn record_access(&self, frame_id: FrameId);

    /// Marks a frame as evictable or pinned. No effect if unchanged.
    ///
    /// Panics if `frame_id` is out of range for the replacer.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Drops a frame's history and evictable membership entirely.
    ///
    /// Panics if the frame is untracked or not evictable; removing a pinned
    /// frame would corrupt the pool's pin accounting.
    fn remove(&self, frame_id: FrameId);

    /// Chooses a victim frame, forgetting its history.
    fn evict(&self) -> Option<FrameId>;

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;
}

#[derive(Debug, Default)]
struct LruKNode {
    /// Access timestamps, newest first, at most k entries.
    history: VecDeque<u64>,
    is_evictable: bool,
}

#[derive(Debug, Default)]
struct LruKState {
    node_store: HashMap<FrameId, LruKNode>,
    /// Evictable frames in the order they became evictable.
    evictable: Vec<FrameId>,
    current_timestamp: u64,
}

/// LRU-K replacer.
///
/// The victim is the evictable frame with the largest backward k-distance:
/// any frame with fewer than k recorded accesses counts as infinitely
/// distant and is preferred, ordered by its earliest recorded access;
/// otherwise the frame whose k-th most recent access is oldest loses.
#[derive(Debug)]
pub struct LRUKReplacer {
    replacer_size: usize,
    k: usize,
    inner: Mutex<LruKState>,
}

impl LRUKReplacer {
    /// Creates a replacer tracking up to `num_frames` frames.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "lru-k replacer needs k > 0");
        Self {
            replacer_size: num_frames,
            k,
            inner: Mutex::new(LruKState::default()),
        }
    }

    fn check_frame_id(&self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range for replacer of size {}",
            frame_id,
            self.replacer_size
        );
    }
}

impl Replacer for LRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        self.check_frame_id(frame_id);
        let state = &mut *self.inner.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let node = state.node_store.entry(frame_id).or_default();
        node.history.push_front(timestamp);
        if node.history.len() > self.k {
            node.history.pop_back();
        }
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.check_frame_id(frame_id);
        let state = &mut *self.inner.lock();
        let node = state.node_store.entry(frame_id).or_default();
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        if evictable {
            state.evictable.push(frame_id);
        } else {
            state.evictable.retain(|&entry| entry != frame_id);
        }
    }

    fn remove(&self, frame_id: FrameId) {
        self.check_frame_id(frame_id);
        let state = &mut *self.inner.lock();
        let evictable = state
            .node_store
            .get(&frame_id)
            .map(|node| node.is_evictable);
        match evictable {
            Some(true) => {
                state.node_store.remove(&frame_id);
                state.evictable.retain(|&entry| entry != frame_id);
            }
            Some(false) => panic!("cannot remove non-evictable frame {}", frame_id),
            None => panic!("cannot remove untracked frame {}", frame_id),
        }
    }

    fn evict(&self) -> Option<FrameId> {
        let state = &mut *self.inner.lock();

        // First pass: frames with fewer than k accesses have infinite
        // k-distance and win, oldest first access first. The evictable list
        // is in insertion order, so strict comparison keeps the earliest
        // inserted frame on ties.
        let mut victim: Option<(usize, u64)> = None;
        for (position, &frame_id) in state.evictable.iter().enumerate() {
            let node = &state.node_store[&frame_id];
            if node.history.len() < self.k {
                let earliest = node.history.back().copied().unwrap_or(0);
                if victim.map_or(true, |(_, best)| earliest < best) {
                    victim = Some((position, earliest));
                }
            }
        }

        // Second pass: everyone has a full history; the smallest k-th most
        // recent timestamp is the largest k-distance.
        if victim.is_none() {
            for (position, &frame_id) in state.evictable.iter().enumerate() {
                let node = &state.node_store[&frame_id];
                let kth_recent = node.history.back().copied().unwrap_or(0);
                if victim.map_or(true, |(_, best)| kth_recent < best) {
                    victim = Some((position, kth_recent));
                }
            }
        }

        let (position, _) = victim?;
        let frame_id = state.evictable.remove(position);
        state.node_store.remove(&frame_id);
        Some(frame_id)
    }

    fn size(&self) -> usize {
        self.inner.lock().evictable.len()
    }
}
