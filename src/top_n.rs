//! Bounded top-N retention
//!
//! A min-heap capped at N items. Once full, a new item only gets in when it
//! beats the smallest retained one, which it then evicts. Memory stays at N no
//! matter how many items stream through.

use crate::model::{Entry, FileRecord};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Anything with a scalar size-like score.
pub trait Scored {
    fn score(&self) -> u64;
}

impl Scored for Entry {
    fn score(&self) -> u64 {
        self.known_size()
    }
}

impl Scored for FileRecord {
    fn score(&self) -> u64 {
        self.size
    }
}

/// Orders purely by score; the payload takes no part in comparisons.
struct Ranked<T> {
    score: u64,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.cmp(&other.score)
    }
}

pub struct TopN<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<T>>>,
}

impl<T: Scored> TopN<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Smallest retained score, if any.
    pub fn min_score(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(r)| r.score)
    }

    /// Offer an item. Returns true when it was retained.
    pub fn push(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let score = item.score();
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(Ranked { score, item }));
            return true;
        }
        match self.min_score() {
            Some(min) if score > min => {
                self.heap.pop();
                self.heap.push(Reverse(Ranked { score, item }));
                true
            }
            _ => false,
        }
    }

    /// Empty the tracker, largest first.
    pub fn drain_descending(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(ranked)) = self.heap.pop() {
            out.push(ranked.item);
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Scored for u64 {
        fn score(&self) -> u64 {
            *self
        }
    }

    #[test]
    fn test_keeps_only_largest() {
        let mut top = TopN::new(3);
        for v in [5u64, 1, 9, 3, 7, 2, 8] {
            top.push(v);
        }
        assert_eq!(top.len(), 3);
        assert_eq!(top.drain_descending(), vec![9, 8, 7]);
    }

    #[test]
    fn test_fewer_items_than_capacity() {
        let mut top = TopN::new(10);
        for v in [4u64, 40, 14] {
            top.push(v);
        }
        assert_eq!(top.drain_descending(), vec![40, 14, 4]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let values: Vec<u64> = (0..10_000u64).map(|v| (v * 7919) % 10_007).collect();
        let mut top = TopN::new(16);
        for v in &values {
            top.push(*v);
            assert!(top.len() <= 16);
        }
        let drained = top.drain_descending();

        let mut expected = values.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        expected.truncate(16);
        assert_eq!(drained, expected);
    }

    #[test]
    fn test_equal_score_does_not_evict() {
        let mut top = TopN::new(2);
        assert!(top.push(5u64));
        assert!(top.push(5u64));
        assert!(!top.push(5u64));
        assert!(top.push(6u64));
        assert_eq!(top.drain_descending(), vec![6, 5]);
    }

    #[test]
    fn test_drain_is_one_shot() {
        let mut top = TopN::new(2);
        top.push(1u64);
        top.push(2u64);
        assert_eq!(top.drain_descending().len(), 2);
        assert!(top.is_empty());
        assert!(top.drain_descending().is_empty());
        // capacity is available again
        assert!(top.push(1u64));
        assert!(top.push(1u64));
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut top = TopN::new(0);
        assert!(!top.push(100u64));
        assert!(top.drain_descending().is_empty());
    }

    #[test]
    fn test_entries_rank_by_size() {
        let mut top = TopN::new(2);
        top.push(Entry::file("a", "/a", 10));
        top.push(Entry::dir("b", "/b", 30));
        top.push(Entry::file("c", "/c", 20));
        let names: Vec<_> = top.drain_descending().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
