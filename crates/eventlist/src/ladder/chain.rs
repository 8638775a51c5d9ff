//! Index-linked doubly linked lists over the ladder's node arena.
//!
//! Top, every rung bucket, and Bottom are each one [`Chain`]. The links live
//! in the nodes, so unlinking from the middle of any tier is O(1).

use super::LadderNode;
use crate::arena::Arena;

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Chain {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<u32> {
        self.head
    }

    pub fn tail(&self) -> Option<u32> {
        self.tail
    }

    pub fn push_front<T, E>(&mut self, nodes: &mut Arena<LadderNode<T, E>>, slot: u32) {
        let old_head = self.head;
        {
            let node = nodes.node_mut(slot);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => nodes.node_mut(head).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.len += 1;
    }

    pub fn push_back<T, E>(&mut self, nodes: &mut Arena<LadderNode<T, E>>, slot: u32) {
        match self.tail {
            Some(tail) => self.insert_after(nodes, tail, slot),
            None => self.push_front(nodes, slot),
        }
    }

    /// Link `slot` directly after `at`, which must be in this chain.
    pub fn insert_after<T, E>(&mut self, nodes: &mut Arena<LadderNode<T, E>>, at: u32, slot: u32) {
        let next = nodes.node(at).next;
        {
            let node = nodes.node_mut(slot);
            node.prev = Some(at);
            node.next = next;
        }
        nodes.node_mut(at).next = Some(slot);
        match next {
            Some(next) => nodes.node_mut(next).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.len += 1;
    }

    pub fn unlink<T, E>(&mut self, nodes: &mut Arena<LadderNode<T, E>>, slot: u32) {
        let (prev, next) = {
            let node = nodes.node(slot);
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => nodes.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => nodes.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
        let node = nodes.node_mut(slot);
        node.prev = None;
        node.next = None;
        self.len -= 1;
    }

    pub fn pop_front<T, E>(&mut self, nodes: &mut Arena<LadderNode<T, E>>) -> Option<u32> {
        let head = self.head?;
        self.unlink(nodes, head);
        Some(head)
    }

    /// Empty the chain, returning its slots head to tail. The returned nodes
    /// keep stale links until they are pushed somewhere else.
    pub fn take_all<T, E>(&mut self, nodes: &Arena<LadderNode<T, E>>) -> Vec<u32> {
        let slots: Vec<u32> = self.iter(nodes).collect();
        *self = Chain::default();
        slots
    }

    pub fn iter<'a, T, E>(
        &self,
        nodes: &'a Arena<LadderNode<T, E>>,
    ) -> impl Iterator<Item = u32> + 'a {
        std::iter::successors(self.head, move |&slot| nodes.node(slot).next)
    }

    pub fn prev_of<T, E>(nodes: &Arena<LadderNode<T, E>>, slot: u32) -> Option<u32> {
        nodes.node(slot).prev
    }
}
