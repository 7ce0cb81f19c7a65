use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for a single tracked frame
#[derive(Debug)]
struct FrameAccess {
    /// The up-to-k most recent access timestamps (oldest at front)
    history: VecDeque<Timestamp>,
    /// Whether this frame may currently be evicted
    is_evictable: bool,
}

impl FrameAccess {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    fn record(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// The timestamp this frame is ordered by: the first access while it
    /// has fewer than k accesses, the k-th most recent once it has k (the
    /// history is capped at k, so both are the front element).
    fn sort_key(&self) -> Timestamp {
        *self.history.front().expect("tracked frame has a history")
    }

    fn has_k_accesses(&self, k: usize) -> bool {
        self.history.len() >= k
    }
}

/// State guarded by the replacer mutex
struct ReplacerState {
    /// Logical clock, bumped on every recorded access
    current_timestamp: Timestamp,
    /// Tracked frames
    frames: HashMap<FrameId, FrameAccess>,
    /// Evictable frames with fewer than k accesses, ordered by first access
    inf_set: BTreeSet<(Timestamp, FrameId)>,
    /// Evictable frames with at least k accesses, ordered by k-th most
    /// recent access
    kth_set: BTreeSet<(Timestamp, FrameId)>,
    /// Number of evictable frames
    num_evictable: usize,
}

impl ReplacerState {
    fn insert_into_set(&mut self, frame_id: FrameId, k: usize) {
        let info = &self.frames[&frame_id];
        let entry = (info.sort_key(), frame_id);
        if info.has_k_accesses(k) {
            self.kth_set.insert(entry);
        } else {
            self.inf_set.insert(entry);
        }
    }

    fn remove_from_set(&mut self, frame_id: FrameId, k: usize) {
        let info = &self.frames[&frame_id];
        let entry = (info.sort_key(), frame_id);
        if info.has_k_accesses(k) {
            self.kth_set.remove(&entry);
        } else {
            self.inf_set.remove(&entry);
        }
    }
}

/// LRU-K replacement policy.
///
/// The victim is chosen among evictable frames: frames with fewer than k
/// recorded accesses come first (ordered by their earliest access), then
/// frames with at least k accesses (ordered by the k-th most recent
/// access, i.e. the oldest of the last k). Ties break on frame ID.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Number of frames the replacer may track
    num_frames: usize,
    /// All replacer state behind a single mutex; operations are short
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer tracking up to `num_frames` frames.
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            k,
            num_frames,
            state: Mutex::new(ReplacerState {
                current_timestamp: 0,
                frames: HashMap::new(),
                inf_set: BTreeSet::new(),
                kth_set: BTreeSet::new(),
                num_evictable: 0,
            }),
        }
    }

    /// Evicts the preferred victim and drops its access history.
    /// Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let victim = match state.inf_set.pop_first() {
            Some(entry) => Some(entry),
            None => state.kth_set.pop_first(),
        };
        let (_, frame_id) = victim?;

        state.frames.remove(&frame_id);
        state.num_evictable -= 1;
        Some(frame_id)
    }

    /// Records one access to the given frame; the frame becomes tracked
    /// if it was not already.
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame {} out of range",
            frame_id
        );

        let mut state = self.state.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let info = state.frames.entry(frame_id).or_insert_with(FrameAccess::new);
        let evictable = info.is_evictable;

        // An evictable frame is keyed by its history, so reposition it
        if evictable {
            state.remove_from_set(frame_id, self.k);
        }
        state
            .frames
            .get_mut(&frame_id)
            .expect("frame was just inserted")
            .record(timestamp, self.k);
        if evictable {
            state.insert_into_set(frame_id, self.k);
        }
    }

    /// Toggles whether a frame may be evicted. No-op for untracked frames.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame {} out of range",
            frame_id
        );

        let mut state = self.state.lock();
        let Some(info) = state.frames.get_mut(&frame_id) else {
            return;
        };
        if info.is_evictable == is_evictable {
            return;
        }
        info.is_evictable = is_evictable;

        if is_evictable {
            state.insert_into_set(frame_id, self.k);
            state.num_evictable += 1;
        } else {
            state.remove_from_set(frame_id, self.k);
            state.num_evictable -= 1;
        }
    }

    /// Forcibly drops a frame's history. The frame must be evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let Some(info) = state.frames.get(&frame_id) else {
            return;
        };
        assert!(info.is_evictable, "removing a non-evictable frame");

        state.remove_from_set(frame_id, self.k);
        state.frames.remove(&frame_id);
        state.num_evictable -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_k_replacer_new() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.k(), 2);
    }

    #[test]
    fn test_lru_k_replacer_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_inf_set_fifo() {
        let replacer = LruKReplacer::new(2, 10);

        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }

        assert_eq!(replacer.size(), 3);

        // All have a single access, so all sit in the inf-set; the
        // earliest first access goes first
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_lru_k_replacer_inf_before_kth() {
        let replacer = LruKReplacer::new(2, 10);

        // Frame 0 reaches k accesses, frame 1 does not
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_kth_ordering() {
        let replacer = LruKReplacer::new(2, 10);

        // Interleaved: A B A B C, then C again
        let a = FrameId::new(1);
        let b = FrameId::new(2);
        let c = FrameId::new(3);

        replacer.record_access(a); // t=0
        replacer.record_access(b); // t=1
        replacer.record_access(a); // t=2
        replacer.record_access(b); // t=3
        replacer.record_access(c); // t=4

        for f in [a, b, c] {
            replacer.set_evictable(f, true);
        }

        // C has a single access: the only inf-set entry wins
        assert_eq!(replacer.evict(), Some(c));

        replacer.record_access(c); // re-track after eviction
        replacer.record_access(c);
        replacer.set_evictable(c, true);

        // All have two accesses now; A's 2nd-most-recent (t=0) is oldest
        assert_eq!(replacer.evict(), Some(a));
        assert_eq!(replacer.evict(), Some(b));
        assert_eq!(replacer.evict(), Some(c));
    }

    #[test]
    fn test_lru_k_replacer_not_evictable_skipped() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_toggle_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_remove() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.remove(FrameId::new(0));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_lru_k_replacer_remove_pinned_panics() {
        let replacer = LruKReplacer::new(2, 10);
        replacer.record_access(FrameId::new(0));
        replacer.remove(FrameId::new(0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_lru_k_replacer_out_of_range_panics() {
        let replacer = LruKReplacer::new(2, 4);
        replacer.record_access(FrameId::new(10));
    }

    #[test]
    fn test_lru_k_replacer_access_repositions() {
        let replacer = LruKReplacer::new(2, 10);

        // Frames 0 and 1 both reach two accesses
        replacer.record_access(FrameId::new(0)); // t=0
        replacer.record_access(FrameId::new(0)); // t=1
        replacer.record_access(FrameId::new(1)); // t=2
        replacer.record_access(FrameId::new(1)); // t=3

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Another access to frame 0 pushes its k-th timestamp past frame 1's
        replacer.record_access(FrameId::new(0)); // t=4, history [1, 4]

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }
}
