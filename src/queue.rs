//! LabelQueue (C1): a lazy-deletion min-heap over `(label, stop_id, is_trip)`.
//!
//! Mirrors the reversed-`Ord` `BinaryHeap` pattern used for Dijkstra-style
//! priority queues elsewhere in this corpus (a max-heap whose `Ord` impl is
//! deliberately inverted so the smallest label comes out first), plus a side
//! table tracking the one live label per key so the labeling loop can
//! requeue a stop without a decrease-key operation.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::cost::Cost;
use crate::error::{PathfindingError, PathfindingResult};
use crate::supply::StopId;

#[derive(Debug, Clone, Copy)]
struct Entry {
    label: Cost,
    stop_id: StopId,
    is_trip: bool,
}

impl Entry {
    /// Ascending priority: smallest label first, ties broken by smaller
    /// `stop_id`, then non-trip (`is_trip = false`) before trip.
    fn priority_cmp(&self, other: &Self) -> Ordering {
        self.label
            .total_cmp(&other.label)
            .then_with(|| self.stop_id.cmp(&other.stop_id))
            .then_with(|| self.is_trip.cmp(&other.is_trip))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.stop_id == other.stop_id && self.is_trip == other.is_trip
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Inverted: `BinaryHeap` is a max-heap, but pop_min() needs the smallest
    // priority tuple out first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority_cmp(self)
    }
}

/// Queue key: which `(stop, link-class)` state a label refers to.
pub type QueueKey = (StopId, bool);

#[derive(Default)]
pub struct LabelQueue {
    heap: BinaryHeap<Entry>,
    /// The current valid label for each live key. Absence means the key is
    /// not currently queued.
    live: HashMap<QueueKey, Cost>,
}

impl LabelQueue {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new(), live: HashMap::new() }
    }

    /// Number of *live* entries — may be far smaller than the raw heap size,
    /// which accumulates stale duplicates over the life of a query.
    pub fn size(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Pushes `(label, stop_id, is_trip)`. A push is accepted when the key
    /// is not currently live, or when `label` strictly improves the
    /// currently live label for that key; otherwise it is silently dropped.
    pub fn push(&mut self, label: Cost, stop_id: StopId, is_trip: bool) {
        let key = (stop_id, is_trip);
        let should_push = match self.live.get(&key) {
            None => true,
            Some(&current) => label < current,
        };
        if should_push {
            self.live.insert(key, label);
            self.heap.push(Entry { label, stop_id, is_trip });
        }
    }

    /// Pops the live entry with the smallest label. Fails with
    /// [`PathfindingError::InvariantViolation`] if called while `size() == 0`,
    /// or if the underlying heap is exhausted before a live entry is found
    /// (which would mean the live table and heap have desynchronized).
    pub fn pop_min(&mut self) -> PathfindingResult<(Cost, StopId, bool)> {
        if self.live.is_empty() {
            return Err(PathfindingError::InvariantViolation("pop_min called on an empty label queue"));
        }
        loop {
            match self.heap.pop() {
                None => {
                    return Err(PathfindingError::InvariantViolation(
                        "label queue heap exhausted while live entries remained",
                    ));
                }
                Some(entry) => {
                    let key = (entry.stop_id, entry.is_trip);
                    if self.live.get(&key) == Some(&entry.label) {
                        self.live.remove(&key);
                        return Ok((entry.label, entry.stop_id, entry.is_trip));
                    }
                    // Stale duplicate (key since invalidated, or a higher
                    // label superseded by a later, lower push): skip it.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_nondecreasing_label_order() {
        let mut q = LabelQueue::new();
        q.push(5.0, 1, false);
        q.push(2.0, 2, false);
        q.push(8.0, 3, true);
        let mut popped = Vec::new();
        while !q.is_empty() {
            popped.push(q.pop_min().unwrap().0);
        }
        assert_eq!(popped, vec![2.0, 5.0, 8.0]);
    }

    #[test]
    fn only_lowest_labeled_duplicate_is_live() {
        let mut q = LabelQueue::new();
        q.push(10.0, 1, false);
        q.push(3.0, 1, false); // improves: replaces the live entry
        q.push(7.0, 1, false); // worse than current live (3.0): dropped
        assert_eq!(q.size(), 1);
        let (label, stop, is_trip) = q.pop_min().unwrap();
        assert_eq!((label, stop, is_trip), (3.0, 1, false));
        assert!(q.is_empty());
    }

    #[test]
    fn ties_break_on_stop_then_non_trip_first() {
        let mut q = LabelQueue::new();
        q.push(1.0, 5, true);
        q.push(1.0, 5, false);
        q.push(1.0, 2, true);
        let first = q.pop_min().unwrap();
        assert_eq!(first, (1.0, 2, true));
        let second = q.pop_min().unwrap();
        assert_eq!(second, (1.0, 5, false));
        let third = q.pop_min().unwrap();
        assert_eq!(third, (1.0, 5, true));
    }

    #[test]
    fn pop_on_empty_queue_is_invariant_violation() {
        let mut q = LabelQueue::new();
        assert!(matches!(q.pop_min(), Err(PathfindingError::InvariantViolation(_))));
    }
}
