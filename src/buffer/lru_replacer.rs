use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::common::FrameId;

struct LruState {
    /// Unpinned frames, most recently unpinned at the front
    queue: VecDeque<FrameId>,
    /// Membership set for O(1) containment checks
    members: HashSet<FrameId>,
}

/// Plain LRU eviction policy: tracks unpinned frames in recency order and
/// reclaims the least-recently-unpinned one. The tracker self-bounds to its
/// configured capacity, evicting its own oldest entry if a new frame would
/// overflow it.
pub struct LruReplacer {
    capacity: usize,
    state: Mutex<LruState>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState {
                queue: VecDeque::with_capacity(capacity),
                members: HashSet::with_capacity(capacity),
            }),
        }
    }

    /// Records that a frame's pin count dropped to zero, making it a
    /// reclaim candidate. No-op if the frame is already tracked.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.members.contains(&frame_id) {
            return;
        }
        if state.queue.len() == self.capacity {
            if let Some(victim) = state.queue.pop_back() {
                state.members.remove(&victim);
            }
        }
        state.queue.push_front(frame_id);
        state.members.insert(frame_id);
    }

    /// Records that a frame was pinned, withdrawing it from eviction.
    /// No-op if the frame is not tracked.
    pub fn pin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.members.remove(&frame_id) {
            if let Some(pos) = state.queue.iter().position(|&f| f == frame_id) {
                state.queue.remove(pos);
            }
        }
    }

    /// Removes and returns the least-recently-unpinned frame, if any.
    pub fn victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let frame_id = state.queue.pop_back()?;
        state.members.remove(&frame_id);
        Some(frame_id)
    }

    /// Number of frames currently tracked.
    pub fn size(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_replacer_victim_order() {
        let replacer = LruReplacer::new(8);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(2));
        assert_eq!(replacer.size(), 3);

        // Oldest unpin goes first
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_unpin_is_idempotent() {
        let replacer = LruReplacer::new(8);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(0)); // does not refresh recency

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_replacer_pin_removes() {
        let replacer = LruReplacer::new(8);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.pin(FrameId::new(0));
        replacer.pin(FrameId::new(5)); // untracked, no-op

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_lru_replacer_self_bounds_capacity() {
        let replacer = LruReplacer::new(2);

        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(2)); // pushes frame 0 out

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(2)));
        assert_eq!(replacer.victim(), None);
    }
}
