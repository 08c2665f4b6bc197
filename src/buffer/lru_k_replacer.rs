use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::warn;

use crate::common::{FrameId, Timestamp};

/// Access bookkeeping for a single tracked frame.
struct FrameInfo {
    /// Up to the last k access timestamps, oldest at the front. While
    /// the frame has fewer than k accesses the front is its first-ever
    /// access; at exactly k the front is the k-th most recent one. That
    /// front value is the frame's key in the history or cache ordering.
    accesses: VecDeque<Timestamp>,
    is_evictable: bool,
}

struct ReplacerState {
    /// Virtual clock; strictly increasing across all recorded accesses
    clock: Timestamp,
    frames: HashMap<FrameId, FrameInfo>,
    /// Frames with fewer than k accesses, ordered by first access
    history: BTreeSet<(Timestamp, FrameId)>,
    /// Frames with k accesses, ordered by k-th most recent access
    cache: BTreeSet<(Timestamp, FrameId)>,
    num_evictable: usize,
}

impl ReplacerState {
    /// Current ordering key of a tracked frame: the front of its access
    /// deque, in whichever set the frame lives.
    fn key_of(info: &FrameInfo) -> Timestamp {
        *info.accesses.front().expect("tracked frame has no accesses")
    }
}

/// LRU-K replacement policy.
///
/// A frame's backward k-distance is the time since its k-th most recent
/// access, or infinite while it has been seen fewer than k times. The
/// replacer evicts the evictable frame with the largest k-distance:
/// frames still short of k accesses go first, in order of their first
/// access, then frames with k accesses in order of their k-th most
/// recent access.
pub struct LruKReplacer {
    k: usize,
    /// Frame ids at or above this bound are rejected
    max_frames: usize,
    inner: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer tracking up to `max_frames` frames with the
    /// given k value.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k >= 1, "k must be at least 1");
        Self {
            k,
            max_frames,
            inner: Mutex::new(ReplacerState {
                clock: 0,
                frames: HashMap::new(),
                history: BTreeSet::new(),
                cache: BTreeSet::new(),
                num_evictable: 0,
            }),
        }
    }

    /// Records an access to `frame_id` at the next clock tick.
    ///
    /// An unknown frame starts in the history set (non-evictable); the
    /// k-th access migrates it to the cache set. A cache frame's
    /// ordering key advances to its new k-th most recent access. A
    /// history frame keeps its first-access key.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            warn!(frame = %frame_id, "access recorded for out-of-range frame");
            return;
        }

        let state = &mut *self.inner.lock();
        let ts = state.clock;
        state.clock += 1;

        match state.frames.get_mut(&frame_id) {
            None => {
                let mut accesses = VecDeque::with_capacity(self.k);
                accesses.push_back(ts);
                state.frames.insert(
                    frame_id,
                    FrameInfo {
                        accesses,
                        is_evictable: false,
                    },
                );
                // With k = 1 a single access already reaches k.
                if self.k == 1 {
                    state.cache.insert((ts, frame_id));
                } else {
                    state.history.insert((ts, frame_id));
                }
            }
            Some(info) if info.accesses.len() < self.k => {
                info.accesses.push_back(ts);
                if info.accesses.len() == self.k {
                    let key = ReplacerState::key_of(info);
                    state.history.remove(&(key, frame_id));
                    state.cache.insert((key, frame_id));
                }
            }
            Some(info) => {
                let old_key = info.accesses.pop_front().expect("cache frame has k accesses");
                info.accesses.push_back(ts);
                let new_key = ReplacerState::key_of(info);
                state.cache.remove(&(old_key, frame_id));
                state.cache.insert((new_key, frame_id));
            }
        }
    }

    /// Flips the evictability of `frame_id`. Unknown frames and
    /// already-matching flags are no-ops.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            warn!(frame = %frame_id, "evictability change for out-of-range frame");
            return;
        }

        let state = &mut *self.inner.lock();
        let Some(info) = state.frames.get_mut(&frame_id) else {
            return;
        };
        if info.is_evictable == evictable {
            return;
        }
        info.is_evictable = evictable;
        if evictable {
            state.num_evictable += 1;
        } else {
            state.num_evictable -= 1;
        }
    }

    /// Drops all replacer state for an evictable frame.
    ///
    /// Removing a non-evictable frame is a caller error: it is reported
    /// and the state is left untouched. Unknown frames are ignored.
    pub fn remove(&self, frame_id: FrameId) {
        let state = &mut *self.inner.lock();
        let Some(info) = state.frames.get(&frame_id) else {
            return;
        };
        if !info.is_evictable {
            warn!(frame = %frame_id, "attempted to remove a non-evictable frame");
            return;
        }
        let key = ReplacerState::key_of(info);
        state.history.remove(&(key, frame_id));
        state.cache.remove(&(key, frame_id));
        state.frames.remove(&frame_id);
        state.num_evictable -= 1;
    }

    /// Evicts the evictable frame with the largest backward k-distance,
    /// dropping all of its state. Returns None when nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let state = &mut *self.inner.lock();
        if state.num_evictable == 0 {
            return None;
        }

        let victim = state
            .history
            .iter()
            .find(|(_, id)| state.frames[id].is_evictable)
            .copied()
            .or_else(|| {
                state
                    .cache
                    .iter()
                    .find(|(_, id)| state.frames[id].is_evictable)
                    .copied()
            });

        let (key, frame_id) = victim?;
        state.history.remove(&(key, frame_id));
        state.cache.remove(&(key, frame_id));
        state.frames.remove(&frame_id);
        state.num_evictable -= 1;
        Some(frame_id)
    }

    /// Number of currently evictable tracked frames.
    pub fn size(&self) -> usize {
        self.inner.lock().num_evictable
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
