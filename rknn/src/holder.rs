//! Distance-keyed priority structures used by every search in the crate.
//!
//! Distances are compared with [`f64::total_cmp`]; entries pushed with equal
//! distance come out in insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Keyed<T> {
    distance: f64,
    seq: u64,
    item: T,
}

impl<T> Keyed<T> {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}

impl<T> PartialEq for Keyed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Keyed<T> {}

impl<T> PartialOrd for Keyed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Keyed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other)
    }
}

/// Min-priority queue: `pop` returns the smallest distance first.
pub struct MinQueue<T> {
    heap: BinaryHeap<std::cmp::Reverse<Keyed<T>>>,
    seq: u64,
}

impl<T> MinQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn push(&mut self, distance: f64, item: T) {
        self.seq += 1;
        self.heap.push(std::cmp::Reverse(Keyed {
            distance,
            seq: self.seq,
            item,
        }));
    }

    pub fn pop(&mut self) -> Option<(f64, T)> {
        self.heap.pop().map(|entry| (entry.0.distance, entry.0.item))
    }

    pub fn peek_distance(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.0.distance)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for MinQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the `capacity` smallest items pushed into it.
///
/// Once full, a push only displaces the current largest item when the new
/// distance is strictly smaller.
pub struct SmallestHolder<T> {
    heap: BinaryHeap<Keyed<T>>,
    capacity: usize,
    seq: u64,
}

impl<T> SmallestHolder<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
            capacity,
            seq: 0,
        }
    }

    /// Offers an item; returns `true` when it was kept.
    pub fn push(&mut self, distance: f64, item: T) -> bool {
        self.seq += 1;
        let entry = Keyed {
            distance,
            seq: self.seq,
            item,
        };
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            Some(top) if distance < top.distance => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
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

    /// Largest kept distance, if any item is held.
    pub fn largest(&self) -> Option<f64> {
        self.heap.peek().map(|top| top.distance)
    }

    /// Largest kept distance, or `+inf` while the holder is not full.
    pub fn bound(&self) -> f64 {
        if self.is_full() {
            self.largest().unwrap_or(f64::INFINITY)
        } else {
            f64::INFINITY
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.heap.iter().map(|entry| (entry.distance, &entry.item))
    }

    /// Consumes the holder, returning items in ascending distance order.
    pub fn into_sorted_vec(self) -> Vec<(f64, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| (entry.distance, entry.item))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_queue_orders_by_distance_then_insertion() {
        let mut queue = MinQueue::new();
        queue.push(2.0, "c");
        queue.push(1.0, "a");
        queue.push(1.0, "b");
        queue.push(0.5, "first");

        assert_eq!(queue.peek_distance(), Some(0.5));
        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|(_, v)| v).collect();
        assert_eq!(order, vec!["first", "a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_holder_keeps_smallest() {
        let mut holder = SmallestHolder::new(3);
        for (d, v) in [(5.0, 'e'), (1.0, 'a'), (4.0, 'd'), (2.0, 'b'), (3.0, 'c')] {
            holder.push(d, v);
        }
        assert!(holder.is_full());
        assert_eq!(holder.largest(), Some(3.0));
        let kept: Vec<_> = holder.into_sorted_vec().into_iter().map(|(_, v)| v).collect();
        assert_eq!(kept, vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_holder_rejects_equal_to_largest_when_full() {
        let mut holder = SmallestHolder::new(1);
        assert!(holder.push(1.0, 1));
        assert!(!holder.push(1.0, 2));
        assert!(holder.push(0.5, 3));
        assert_eq!(holder.into_sorted_vec(), vec![(0.5, 3)]);
    }

    #[test]
    fn test_zero_capacity_holder() {
        let mut holder = SmallestHolder::new(0);
        assert!(holder.is_full());
        assert!(!holder.push(0.0, ()));
        assert_eq!(holder.largest(), None);
        assert_eq!(holder.bound(), f64::INFINITY);
    }

    #[test]
    fn test_bound_is_infinite_until_full() {
        let mut holder = SmallestHolder::new(2);
        holder.push(1.0, ());
        assert_eq!(holder.bound(), f64::INFINITY);
        holder.push(3.0, ());
        assert_eq!(holder.bound(), 3.0);
    }
}
