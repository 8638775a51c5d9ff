//! Array-backed binary min-heap.
//!
//! ```text
//!   heap:  [ - | s4 | s0 | s2 | s7 | ... ]     1-indexed, heap[0] unused
//!                 │
//!                 ▼
//!   arena: slot 4 ─ { event, index: 1 }        each node knows its position
//! ```
//!
//! Because every node records its own heap index, `cancel` and `adjust` go
//! straight to the node and re-heapify from there.

use crate::arena::Arena;
use crate::error::StructuralError;
use crate::event::{EventHandle, ListId, SimEvent};
use crate::list::{check_detached, check_timestamp, EventList, EventListKind};
use pdes_types::Timestamp;
use std::cmp::Ordering;

const INITIAL_CAPACITY: usize = 128;

#[derive(Debug)]
struct HeapNode<T, E> {
    event: SimEvent<T, E>,
    index: usize,
}

/// Binary min-heap with O(log n) insert, delete-min, cancel and adjust.
#[derive(Debug)]
pub struct BinaryHeap<T, E> {
    id: ListId,
    /// Slot indices in heap order. Position 0 is a placeholder.
    heap: Vec<u32>,
    nodes: Arena<HeapNode<T, E>>,
}

impl<T: Timestamp, E> Default for BinaryHeap<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timestamp, E> BinaryHeap<T, E> {
    pub fn new() -> Self {
        let mut heap = Vec::with_capacity(INITIAL_CAPACITY + 1);
        heap.push(u32::MAX);
        Self {
            id: ListId::next(),
            heap,
            nodes: Arena::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Number of heap positions allocated.
    pub fn capacity(&self) -> usize {
        self.heap.capacity() - 1
    }

    fn time_at(&self, index: usize) -> T {
        self.nodes.node(self.heap[index]).event.timestamp()
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.time_at(a).cmp_time(&self.time_at(b)) == Ordering::Less
    }

    fn place(&mut self, index: usize, slot: u32) {
        self.heap[index] = slot;
        self.nodes.node_mut(slot).index = index;
    }

    fn swap(&mut self, a: usize, b: usize) {
        let (slot_a, slot_b) = (self.heap[a], self.heap[b]);
        self.place(a, slot_b);
        self.place(b, slot_a);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 1 {
            let parent = index / 2;
            if !self.less(index, parent) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let last = self.heap.len() - 1;
        loop {
            let left = index * 2;
            if left > last {
                break;
            }
            let right = left + 1;
            let child = if right <= last && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, index) {
                break;
            }
            self.swap(index, child);
            index = child;
        }
    }

    /// Restore heap order around `index` after its key changed.
    fn reheapify(&mut self, index: usize) {
        if index > 1 && self.less(index, index / 2) {
            self.sift_up(index);
        } else {
            self.sift_down(index);
        }
    }

    /// Remove the node at heap position `index`, filling the hole with the
    /// last element.
    fn remove_at(&mut self, index: usize) -> SimEvent<T, E> {
        let slot = self.heap[index];
        let last = self.heap.pop().unwrap_or(slot);
        if index < self.heap.len() {
            self.place(index, last);
            self.reheapify(index);
        }
        self.nodes.remove(slot).event.detach()
    }
}

impl<T: Timestamp, E> EventList<T, E> for BinaryHeap<T, E> {
    fn id(&self) -> ListId {
        self.id
    }

    fn kind(&self) -> EventListKind {
        EventListKind::BinaryHeap
    }

    fn len(&self) -> usize {
        self.heap.len() - 1
    }

    fn peek_min(&self) -> Option<&SimEvent<T, E>> {
        self.heap.get(1).map(|&slot| &self.nodes.node(slot).event)
    }

    fn delete_min(&mut self) -> Option<SimEvent<T, E>> {
        if self.heap.len() <= 1 {
            return None;
        }
        Some(self.remove_at(1))
    }

    fn try_insert(&mut self, event: SimEvent<T, E>) -> Result<EventHandle, StructuralError> {
        check_detached(&event)?;
        check_timestamp(event.timestamp())?;

        if self.heap.len() == self.heap.capacity() {
            // Grow by doubling.
            self.heap.reserve_exact(self.heap.capacity());
        }
        let index = self.heap.len();
        let (slot, generation) = self.nodes.insert(HeapNode { event, index });
        let handle = EventHandle {
            list: self.id,
            slot,
            generation,
        };
        self.nodes.node_mut(slot).event.attach(handle);
        self.heap.push(slot);
        self.sift_up(index);
        Ok(handle)
    }

    fn try_cancel(&mut self, handle: EventHandle) -> Result<SimEvent<T, E>, StructuralError> {
        let slot = self.nodes.resolve(self.id, handle)?;
        let index = self.nodes.node(slot).index;
        Ok(self.remove_at(index))
    }

    fn try_adjust(&mut self, handle: EventHandle, timestamp: T) -> Result<(), StructuralError> {
        let slot = self.nodes.resolve(self.id, handle)?;
        check_timestamp(timestamp)?;
        let node = self.nodes.node_mut(slot);
        node.event.set_timestamp(timestamp);
        let index = node.index;
        self.reheapify(index);
        Ok(())
    }

    fn get(&self, handle: EventHandle) -> Option<&SimEvent<T, E>> {
        self.nodes.get(self.id, handle).map(|node| &node.event)
    }

    fn clear(&mut self) {
        self.heap.truncate(1);
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: &mut BinaryHeap<u64, &'static str>) -> Vec<u64> {
        std::iter::from_fn(|| heap.delete_min().map(|e| e.timestamp())).collect()
    }

    #[test]
    fn test_delete_min_returns_sorted_order() {
        let mut heap = BinaryHeap::new();
        for t in [7, 3, 9, 3, 1] {
            heap.insert(SimEvent::new(t, "x"));
        }
        assert_eq!(heap.len(), 5);
        assert_eq!(drain(&mut heap), vec![1, 3, 3, 7, 9]);
        assert!(heap.is_empty());
        assert!(heap.delete_min().is_none());
    }

    #[test]
    fn test_grows_by_doubling() {
        let mut heap = BinaryHeap::new();
        assert!(heap.capacity() >= INITIAL_CAPACITY);
        for t in 0..(INITIAL_CAPACITY as u64 + 1) {
            heap.insert(SimEvent::new(t, "x"));
        }
        assert!(heap.capacity() >= 2 * INITIAL_CAPACITY);
        assert_eq!(heap.peek_min().map(|e| e.timestamp()), Some(0));
    }

    #[test]
    fn test_cancel_from_middle() {
        let mut heap = BinaryHeap::new();
        let handles: Vec<_> = [5, 1, 8, 2, 9, 4]
            .into_iter()
            .map(|t| heap.insert(SimEvent::new(t, "x")))
            .collect();

        let cancelled = heap.try_cancel(handles[3]).unwrap();
        assert_eq!(cancelled.timestamp(), 2);
        assert!(!cancelled.is_scheduled());
        assert!(!heap.contains(handles[3]));
        assert_eq!(drain(&mut heap), vec![1, 4, 5, 8, 9]);
    }

    #[test]
    fn test_adjust_moves_both_directions() {
        let mut heap = BinaryHeap::new();
        let a = heap.insert(SimEvent::new(10u64, "a"));
        let b = heap.insert(SimEvent::new(20, "b"));
        heap.insert(SimEvent::new(30, "c"));

        heap.adjust(b, 5);
        assert_eq!(heap.peek_min().map(|e| *e.payload()), Some("b"));

        heap.adjust(b, 40);
        heap.adjust(a, 35);
        let order: Vec<_> =
            std::iter::from_fn(|| heap.delete_min().map(|e| *e.payload())).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_delivered_event_is_detached() {
        let mut heap = BinaryHeap::new();
        let handle = heap.insert(SimEvent::new(1u64, "x"));
        assert_eq!(heap.get(handle).and_then(|e| e.owner()), Some(handle));
        let event = heap.delete_min().unwrap();
        assert!(event.owner().is_none());
        assert!(heap.get(handle).is_none());
    }

    #[test]
    fn test_stale_handle_is_an_error() {
        let mut heap = BinaryHeap::new();
        let handle = heap.insert(SimEvent::new(1u64, "x"));
        heap.delete_min();
        assert_eq!(
            heap.try_cancel(handle).unwrap_err(),
            StructuralError::StaleHandle(handle)
        );
    }

    #[test]
    fn test_nan_timestamp_rejected() {
        let mut heap: BinaryHeap<f64, ()> = BinaryHeap::new();
        assert!(matches!(
            heap.try_insert(SimEvent::new(f64::NAN, ())),
            Err(StructuralError::InvalidTimestamp(_))
        ));
        assert!(heap.is_empty());
    }
}
