//! Generation-checked slot storage shared by the list implementations.
//!
//! ```text
//!   slots:  [ gen 3 | node ]  [ gen 1 | ---- ]  [ gen 0 | node ]
//!                                  ^
//!   free:   [1]  (vacant slots, reused LIFO)
//! ```
//!
//! Links between nodes are slot indices. Removing a node bumps its slot's
//! generation, which invalidates every handle issued for the old occupant.

use crate::error::StructuralError;
use crate::event::{EventHandle, ListId};

#[derive(Debug)]
struct Slot<N> {
    generation: u32,
    node: Option<N>,
}

#[derive(Debug)]
pub(crate) struct Arena<N> {
    slots: Vec<Slot<N>>,
    free: Vec<u32>,
    len: usize,
}

impl<N> Default for Arena<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<N> Arena<N> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Store a node, returning its slot and generation.
    pub fn insert(&mut self, node: N) -> (u32, u32) {
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.node = Some(node);
            return (slot, entry.generation);
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        (slot, 0)
    }

    /// Take a node out, invalidating handles to it.
    pub fn remove(&mut self, slot: u32) -> N {
        let entry = &mut self.slots[slot as usize];
        let Some(node) = entry.node.take() else {
            unreachable!("arena slot {slot} is vacant");
        };
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);
        self.len -= 1;
        node
    }

    /// Occupied slot by index. Internal links always name occupied slots.
    pub fn node(&self, slot: u32) -> &N {
        match &self.slots[slot as usize].node {
            Some(node) => node,
            None => unreachable!("arena slot {slot} is vacant"),
        }
    }

    pub fn node_mut(&mut self, slot: u32) -> &mut N {
        match &mut self.slots[slot as usize].node {
            Some(node) => node,
            None => unreachable!("arena slot {slot} is vacant"),
        }
    }

    /// Resolve a caller's handle to an occupied slot of the list `list`.
    pub fn resolve(&self, list: ListId, handle: EventHandle) -> Result<u32, StructuralError> {
        if handle.list != list {
            return Err(StructuralError::ForeignHandle { handle, list });
        }
        match self.slots.get(handle.slot as usize) {
            Some(entry) if entry.generation == handle.generation && entry.node.is_some() => {
                Ok(handle.slot)
            }
            _ => Err(StructuralError::StaleHandle(handle)),
        }
    }

    pub fn get(&self, list: ListId, handle: EventHandle) -> Option<&N> {
        self.resolve(list, handle).ok().map(|slot| self.node(slot))
    }

    /// Drop every node and invalidate all outstanding handles.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if entry.node.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
            }
            self.free.push(index as u32);
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(list: ListId, slot: u32, generation: u32) -> EventHandle {
        EventHandle {
            list,
            slot,
            generation,
        }
    }

    #[test]
    fn test_removed_slot_is_reused_with_new_generation() {
        let list = ListId::next();
        let mut arena = Arena::default();
        let (slot, generation) = arena.insert("a");
        assert_eq!(arena.remove(slot), "a");

        let (reused, next_generation) = arena.insert("b");
        assert_eq!(reused, slot);
        assert_ne!(next_generation, generation);
        assert_eq!(
            arena.resolve(list, handle(list, slot, generation)),
            Err(StructuralError::StaleHandle(handle(list, slot, generation)))
        );
        assert_eq!(
            arena.get(list, handle(list, slot, next_generation)),
            Some(&"b")
        );
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let list = ListId::next();
        let other = ListId::next();
        let mut arena = Arena::default();
        let (slot, generation) = arena.insert(1u8);
        assert!(matches!(
            arena.resolve(list, handle(other, slot, generation)),
            Err(StructuralError::ForeignHandle { .. })
        ));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let list = ListId::next();
        let mut arena = Arena::with_capacity(4);
        let (slot, generation) = arena.insert(7u32);
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert!(arena.get(list, handle(list, slot, generation)).is_none());
    }
}
