//! Playback queue - ordered, unique by track id

use std::sync::Arc;

use crate::track::{Track, TrackId};

/// Where an enqueued track is inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePosition {
    /// Head of the queue (play-now intent)
    Front,
    /// Tail of the queue
    Back,
}

/// Outcome of removing a track
#[derive(Debug, PartialEq)]
pub enum RemoveOutcome {
    /// Track was not in the queue
    NotFound,
    /// A non-current entry was removed
    Removed,
    /// The current entry was removed and this is the new selection
    RemovedCurrent(Option<Arc<Track>>),
}

/// Result of a next/previous step
#[derive(Debug)]
pub struct Advance {
    pub track: Arc<Track>,
    /// True when the step crossed an end of the queue
    pub wrapped: bool,
}

/// Ordered track queue
///
/// Entries are unique by id. The current track is tracked by id and
/// re-derived after any mutation, so reordering never detaches it.
#[derive(Default)]
pub struct Queue {
    entries: Vec<Arc<Track>>,
    current: Option<TrackId>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.entries
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.entries.iter().any(|t| t.id == id)
    }

    pub fn current(&self) -> Option<&Arc<Track>> {
        let id = self.current?;
        self.entries.iter().find(|t| t.id == id)
    }

    pub fn current_id(&self) -> Option<TrackId> {
        self.current
    }

    fn current_index(&self) -> Option<usize> {
        let id = self.current?;
        self.entries.iter().position(|t| t.id == id)
    }

    /// Mark a queued track as current. Ignored if the id is not queued.
    pub fn select(&mut self, id: TrackId) -> Option<&Arc<Track>> {
        if self.contains(id) {
            self.current = Some(id);
            self.current()
        } else {
            None
        }
    }

    /// Insert a track. A duplicate id leaves order and length untouched
    /// and returns false.
    pub fn enqueue(&mut self, track: Arc<Track>, position: EnqueuePosition) -> bool {
        if self.contains(track.id) {
            return false;
        }
        match position {
            EnqueuePosition::Front => self.entries.insert(0, track),
            EnqueuePosition::Back => self.entries.push(track),
        }
        true
    }

    /// Remove a track by id
    pub fn remove(&mut self, id: TrackId) -> RemoveOutcome {
        let Some(index) = self.entries.iter().position(|t| t.id == id) else {
            return RemoveOutcome::NotFound;
        };

        let was_current = self.current == Some(id);
        self.entries.remove(index);

        if was_current {
            // The new selection is the first remaining entry, or none
            let next = self.entries.first().cloned();
            self.current = next.as_ref().map(|t| t.id);
            RemoveOutcome::RemovedCurrent(next)
        } else {
            RemoveOutcome::Removed
        }
    }

    /// Stable move of the entry at `from` to position `to`.
    /// Out-of-range indices are ignored.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from >= self.entries.len() || to >= self.entries.len() || from == to {
            return;
        }
        let track = self.entries.remove(from);
        self.entries.insert(to, track);
        // current is id-keyed, nothing to fix up
    }

    /// Step forward, wrapping at the tail. None on an empty queue.
    /// With nothing selected yet, the step lands on the head.
    pub fn next(&mut self) -> Option<Advance> {
        if self.entries.is_empty() {
            return None;
        }
        let (next_index, wrapped) = match self.current_index() {
            Some(index) => {
                let wrapped = index + 1 >= self.entries.len();
                (if wrapped { 0 } else { index + 1 }, wrapped)
            }
            None => (0, false),
        };

        let track = self.entries[next_index].clone();
        self.current = Some(track.id);
        Some(Advance { track, wrapped })
    }

    /// Step backward, wrapping at the head. None on an empty queue.
    pub fn previous(&mut self) -> Option<Advance> {
        if self.entries.is_empty() {
            return None;
        }
        let index = self.current_index().unwrap_or(0);
        let wrapped = index == 0;
        let prev_index = if wrapped {
            self.entries.len() - 1
        } else {
            index - 1
        };

        let track = self.entries[prev_index].clone();
        self.current = Some(track.id);
        Some(Advance { track, wrapped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> Arc<Track> {
        Track::from_path(format!("/music/{name}.mp3"))
    }

    fn queue_of(names: &[&str]) -> (Queue, Vec<Arc<Track>>) {
        let mut queue = Queue::new();
        let tracks: Vec<_> = names.iter().map(|n| track(n)).collect();
        for t in &tracks {
            queue.enqueue(t.clone(), EnqueuePosition::Back);
        }
        (queue, tracks)
    }

    #[test]
    fn test_duplicate_enqueue_is_a_no_op() {
        let (mut queue, tracks) = queue_of(&["a", "b"]);
        assert!(!queue.enqueue(tracks[0].clone(), EnqueuePosition::Back));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.tracks()[0].id, tracks[0].id);
    }

    #[test]
    fn test_enqueue_front_inserts_at_head() {
        let (mut queue, _) = queue_of(&["a", "b"]);
        let c = track("c");
        queue.enqueue(c.clone(), EnqueuePosition::Front);
        assert_eq!(queue.tracks()[0].id, c.id);
    }

    #[test]
    fn test_remove_current_selects_first_remaining() {
        let (mut queue, tracks) = queue_of(&["a", "b", "c"]);
        queue.select(tracks[1].id);

        match queue.remove(tracks[1].id) {
            RemoveOutcome::RemovedCurrent(Some(next)) => assert_eq!(next.id, tracks[0].id),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(queue.current_id(), Some(tracks[0].id));
    }

    #[test]
    fn test_remove_last_entry_goes_idle() {
        let (mut queue, tracks) = queue_of(&["a"]);
        queue.select(tracks[0].id);

        match queue.remove(tracks[0].id) {
            RemoveOutcome::RemovedCurrent(None) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(queue.current().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_non_current_keeps_selection() {
        let (mut queue, tracks) = queue_of(&["a", "b"]);
        queue.select(tracks[0].id);
        assert_eq!(queue.remove(tracks[1].id), RemoveOutcome::Removed);
        assert_eq!(queue.current_id(), Some(tracks[0].id));
    }

    #[test]
    fn test_next_wraps_from_tail_to_head() {
        let (mut queue, tracks) = queue_of(&["a", "b", "c"]);
        queue.select(tracks[2].id);

        let advance = queue.next().unwrap();
        assert_eq!(advance.track.id, tracks[0].id);
        assert!(advance.wrapped);
    }

    #[test]
    fn test_previous_wraps_from_head_to_tail() {
        let (mut queue, tracks) = queue_of(&["a", "b", "c"]);
        queue.select(tracks[0].id);

        let advance = queue.previous().unwrap();
        assert_eq!(advance.track.id, tracks[2].id);
        assert!(advance.wrapped);
    }

    #[test]
    fn test_next_mid_queue_does_not_wrap() {
        let (mut queue, tracks) = queue_of(&["a", "b", "c"]);
        queue.select(tracks[0].id);

        let advance = queue.next().unwrap();
        assert_eq!(advance.track.id, tracks[1].id);
        assert!(!advance.wrapped);
    }

    #[test]
    fn test_next_without_selection_starts_at_head() {
        let (mut queue, tracks) = queue_of(&["a", "b"]);

        let advance = queue.next().unwrap();
        assert_eq!(advance.track.id, tracks[0].id);
        assert!(!advance.wrapped);
        assert_eq!(queue.current_id(), Some(tracks[0].id));
    }

    #[test]
    fn test_next_and_previous_on_empty_queue_are_no_ops() {
        let mut queue = Queue::new();
        assert!(queue.next().is_none());
        assert!(queue.previous().is_none());
    }

    #[test]
    fn test_reorder_keeps_current_by_id() {
        let (mut queue, tracks) = queue_of(&["a", "b", "c"]);
        queue.select(tracks[2].id);

        queue.reorder(2, 0);
        assert_eq!(queue.tracks()[0].id, tracks[2].id);
        assert_eq!(queue.current_id(), Some(tracks[2].id));

        // Next from the moved current steps into the shifted order
        let advance = queue.next().unwrap();
        assert_eq!(advance.track.id, tracks[0].id);
    }

    #[test]
    fn test_reorder_out_of_range_is_ignored() {
        let (mut queue, tracks) = queue_of(&["a", "b"]);
        queue.reorder(5, 0);
        queue.reorder(0, 9);
        assert_eq!(queue.tracks()[0].id, tracks[0].id);
    }

    #[test]
    fn test_select_unknown_id_is_ignored() {
        let (mut queue, _) = queue_of(&["a"]);
        assert!(queue.select(TrackId(9999)).is_none());
        assert!(queue.current_id().is_none());
    }
}
