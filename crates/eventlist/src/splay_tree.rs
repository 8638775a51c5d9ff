//! Self-adjusting binary search tree ordered by timestamp.
//!
//! Inserts and every removal other than the minimum splay the touched node to
//! the root, so time-local traffic stays near the top. The leftmost node is
//! cached, which makes `peek_min` O(1) and lets `delete_min` unlink without a
//! descent from the root.
//!
//! Nodes live in an [`Arena`]; a rotation only rewrites slot indices.

use crate::arena::Arena;
use crate::error::StructuralError;
use crate::event::{EventHandle, ListId, SimEvent};
use crate::list::{check_detached, check_timestamp, EventList, EventListKind};
use pdes_types::Timestamp;
use std::cmp::Ordering;

#[derive(Debug)]
struct TreeNode<T, E> {
    event: SimEvent<T, E>,
    parent: Option<u32>,
    left: Option<u32>,
    right: Option<u32>,
}

/// Splay tree with amortized O(log n) operations and a cached minimum.
#[derive(Debug)]
pub struct SplayTree<T, E> {
    id: ListId,
    nodes: Arena<TreeNode<T, E>>,
    root: Option<u32>,
    min: Option<u32>,
}

impl<T: Timestamp, E> Default for SplayTree<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timestamp, E> SplayTree<T, E> {
    pub fn new() -> Self {
        Self {
            id: ListId::next(),
            nodes: Arena::default(),
            root: None,
            min: None,
        }
    }

    fn time(&self, slot: u32) -> T {
        self.nodes.node(slot).event.timestamp()
    }

    fn parent(&self, slot: u32) -> Option<u32> {
        self.nodes.node(slot).parent
    }

    fn left(&self, slot: u32) -> Option<u32> {
        self.nodes.node(slot).left
    }

    fn right(&self, slot: u32) -> Option<u32> {
        self.nodes.node(slot).right
    }

    fn set_parent(&mut self, slot: Option<u32>, parent: Option<u32>) {
        if let Some(slot) = slot {
            self.nodes.node_mut(slot).parent = parent;
        }
    }

    /// Point whatever referenced `old` as a child (or the root) at `new`.
    fn replace_child(&mut self, parent: Option<u32>, old: u32, new: Option<u32>) {
        match parent {
            Some(p) if self.left(p) == Some(old) => self.nodes.node_mut(p).left = new,
            Some(p) => self.nodes.node_mut(p).right = new,
            None => self.root = new,
        }
        self.set_parent(new, parent);
    }

    /// Rotate `x` above its parent.
    fn rotate(&mut self, x: u32) {
        let Some(p) = self.parent(x) else {
            return;
        };
        let grandparent = self.parent(p);
        if self.left(p) == Some(x) {
            let inner = self.right(x);
            self.nodes.node_mut(p).left = inner;
            self.set_parent(inner, Some(p));
            self.nodes.node_mut(x).right = Some(p);
        } else {
            let inner = self.left(x);
            self.nodes.node_mut(p).right = inner;
            self.set_parent(inner, Some(p));
            self.nodes.node_mut(x).left = Some(p);
        }
        self.nodes.node_mut(p).parent = Some(x);
        self.replace_child(grandparent, p, Some(x));
    }

    /// Move `x` to the top of the tree it belongs to.
    fn splay(&mut self, x: u32) {
        while let Some(p) = self.parent(x) {
            match self.parent(p) {
                None => self.rotate(x),
                Some(g) => {
                    let zig_zig = (self.left(g) == Some(p)) == (self.left(p) == Some(x));
                    if zig_zig {
                        self.rotate(p);
                    } else {
                        self.rotate(x);
                    }
                    self.rotate(x);
                }
            }
        }
    }

    fn leftmost(&self, mut slot: u32) -> u32 {
        while let Some(left) = self.left(slot) {
            slot = left;
        }
        slot
    }

    fn rightmost(&self, mut slot: u32) -> u32 {
        while let Some(right) = self.right(slot) {
            slot = right;
        }
        slot
    }

    /// Hang an unlinked node into the tree and splay it to the root.
    fn link(&mut self, slot: u32) {
        let time = self.time(slot);
        let mut parent = None;
        let mut cursor = self.root;
        let mut go_left = false;
        while let Some(current) = cursor {
            parent = Some(current);
            go_left = time.cmp_time(&self.time(current)) == Ordering::Less;
            cursor = if go_left {
                self.left(current)
            } else {
                self.right(current)
            };
        }

        {
            let node = self.nodes.node_mut(slot);
            node.parent = parent;
            node.left = None;
            node.right = None;
        }
        match parent {
            None => self.root = Some(slot),
            Some(p) if go_left => self.nodes.node_mut(p).left = Some(slot),
            Some(p) => self.nodes.node_mut(p).right = Some(slot),
        }

        // Equal keys go right, so the cached minimum only moves for a
        // strictly smaller time.
        match self.min {
            Some(min) if time.cmp_time(&self.time(min)) != Ordering::Less => {}
            _ => self.min = Some(slot),
        }
        self.splay(slot);
    }

    /// Detach the cached minimum. It has no left child, so its right subtree
    /// takes its place and the new minimum is found locally.
    fn unlink_min(&mut self, min: u32) {
        let parent = self.parent(min);
        let right = self.right(min);
        self.replace_child(parent, min, right);
        self.min = match right {
            Some(r) => Some(self.leftmost(r)),
            None => parent,
        };
    }

    /// Detach any node, keeping its slot allocated.
    fn unlink(&mut self, slot: u32) {
        if self.min == Some(slot) {
            self.unlink_min(slot);
            return;
        }

        self.splay(slot);
        let left = self.left(slot);
        let right = self.right(slot);
        match left {
            None => {
                self.root = right;
                self.set_parent(right, None);
            }
            Some(left) => {
                self.set_parent(Some(left), None);
                self.root = Some(left);
                let max = self.rightmost(left);
                self.splay(max);
                self.nodes.node_mut(max).right = right;
                self.set_parent(right, Some(max));
                self.root = Some(max);
            }
        }
    }

    fn remove(&mut self, slot: u32) -> SimEvent<T, E> {
        self.unlink(slot);
        self.nodes.remove(slot).event.detach()
    }
}

impl<T: Timestamp, E> EventList<T, E> for SplayTree<T, E> {
    fn id(&self) -> ListId {
        self.id
    }

    fn kind(&self) -> EventListKind {
        EventListKind::SplayTree
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn peek_min(&self) -> Option<&SimEvent<T, E>> {
        self.min.map(|slot| &self.nodes.node(slot).event)
    }

    fn delete_min(&mut self) -> Option<SimEvent<T, E>> {
        let min = self.min?;
        self.unlink_min(min);
        Some(self.nodes.remove(min).event.detach())
    }

    fn try_insert(&mut self, event: SimEvent<T, E>) -> Result<EventHandle, StructuralError> {
        check_detached(&event)?;
        check_timestamp(event.timestamp())?;

        let (slot, generation) = self.nodes.insert(TreeNode {
            event,
            parent: None,
            left: None,
            right: None,
        });
        let handle = EventHandle {
            list: self.id,
            slot,
            generation,
        };
        self.nodes.node_mut(slot).event.attach(handle);
        self.link(slot);
        Ok(handle)
    }

    fn try_cancel(&mut self, handle: EventHandle) -> Result<SimEvent<T, E>, StructuralError> {
        let slot = self.nodes.resolve(self.id, handle)?;
        Ok(self.remove(slot))
    }

    fn try_adjust(&mut self, handle: EventHandle, timestamp: T) -> Result<(), StructuralError> {
        let slot = self.nodes.resolve(self.id, handle)?;
        check_timestamp(timestamp)?;
        self.unlink(slot);
        self.nodes.node_mut(slot).event.set_timestamp(timestamp);
        self.link(slot);
        Ok(())
    }

    fn get(&self, handle: EventHandle) -> Option<&SimEvent<T, E>> {
        self.nodes.get(self.id, handle).map(|node| &node.event)
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.min = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<E>(tree: &mut SplayTree<u64, E>) -> Vec<u64> {
        std::iter::from_fn(|| tree.delete_min().map(|e| e.timestamp())).collect()
    }

    #[test]
    fn test_delete_min_returns_sorted_order() {
        let mut tree = SplayTree::new();
        for t in [7, 3, 9, 3, 1] {
            tree.insert(SimEvent::new(t, ()));
        }
        assert_eq!(drain(&mut tree), vec![1, 3, 3, 7, 9]);
        assert_eq!(tree.len(), 0);
        assert!(tree.delete_min().is_none());
    }

    #[test]
    fn test_insert_splays_to_root() {
        let mut tree = SplayTree::new();
        for t in [50u64, 20, 80, 10] {
            let handle = tree.insert(SimEvent::new(t, ()));
            assert_eq!(tree.root, Some(handle.slot));
        }
        assert_eq!(tree.peek_min().map(|e| e.timestamp()), Some(10));
    }

    #[test]
    fn test_cancel_non_minimum_keeps_cached_min() {
        let mut tree = SplayTree::new();
        let handles: Vec<_> = [40u64, 10, 30, 20, 50]
            .into_iter()
            .map(|t| tree.insert(SimEvent::new(t, t)))
            .collect();

        let cancelled = tree.try_cancel(handles[2]).unwrap();
        assert_eq!(*cancelled.payload(), 30);
        assert_eq!(tree.peek_min().map(|e| e.timestamp()), Some(10));
        assert_eq!(drain(&mut tree), vec![10, 20, 40, 50]);
    }

    #[test]
    fn test_cancel_minimum_recomputes_min() {
        let mut tree = SplayTree::new();
        let first = tree.insert(SimEvent::new(5u64, ()));
        tree.insert(SimEvent::new(9, ()));
        tree.insert(SimEvent::new(7, ()));
        tree.cancel(first);
        assert_eq!(tree.peek_min().map(|e| e.timestamp()), Some(7));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_adjust_keeps_handle() {
        let mut tree = SplayTree::new();
        let a = tree.insert(SimEvent::new(10u64, 'a'));
        tree.insert(SimEvent::new(20, 'b'));
        tree.insert(SimEvent::new(30, 'c'));

        tree.adjust(a, 25);
        assert!(tree.contains(a));
        assert_eq!(tree.get(a).map(|e| e.timestamp()), Some(25));
        let order: Vec<_> =
            std::iter::from_fn(|| tree.delete_min().map(|e| *e.payload())).collect();
        assert_eq!(order, vec!['b', 'a', 'c']);
    }

    #[test]
    fn test_ascending_inserts_drain_from_left_spine() {
        let mut tree = SplayTree::new();
        for t in 0..1_000u64 {
            tree.insert(SimEvent::new(t, ()));
        }
        // Every insert splays the new maximum to the root, leaving a left
        // spine that delete_min walks up one parent at a time.
        assert_eq!(tree.root.map(|slot| tree.time(slot)), Some(999));
        assert_eq!(drain(&mut tree), (0..1_000).collect::<Vec<_>>());
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut a: SplayTree<u64, ()> = SplayTree::new();
        let mut b: SplayTree<u64, ()> = SplayTree::new();
        let handle = a.insert(SimEvent::new(1, ()));
        assert!(matches!(
            b.try_adjust(handle, 2),
            Err(StructuralError::ForeignHandle { .. })
        ));
    }
}
