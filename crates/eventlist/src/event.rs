//! Scheduled events and the handles that name them.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_LIST_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one event-list instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(u32);

impl ListId {
    /// Allocate a process-unique list id.
    pub(crate) fn next() -> Self {
        ListId(NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "List({})", self.0)
    }
}

/// Names a scheduled event: the owning list, its arena slot, and the slot
/// generation at insertion time.
///
/// A handle goes stale once its event is delivered or cancelled. Lists check
/// the generation, so a stale handle is never confused with the slot's next
/// occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    pub(crate) list: ListId,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl EventHandle {
    /// The list this handle belongs to.
    pub fn list(&self) -> ListId {
        self.list
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.list, self.slot, self.generation)
    }
}

/// The unit stored in an event list.
///
/// `owner` is set exactly while the event sits in a list. Events handed back
/// by `delete_min` or `cancel` are detached again. Cloning a scheduled event
/// copies its owner, so inserting the clone is rejected.
#[derive(Debug, Clone)]
pub struct SimEvent<T, E> {
    timestamp: T,
    payload: E,
    owner: Option<EventHandle>,
}

impl<T: Copy, E> SimEvent<T, E> {
    /// Create a detached event.
    pub fn new(timestamp: T, payload: E) -> Self {
        Self {
            timestamp,
            payload,
            owner: None,
        }
    }

    /// Scheduled time.
    pub fn timestamp(&self) -> T {
        self.timestamp
    }

    /// Change the time of a detached event.
    ///
    /// Scheduled events are moved with `EventList::adjust` instead.
    pub fn set_timestamp(&mut self, timestamp: T) {
        self.timestamp = timestamp;
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut E {
        &mut self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// The handle of the list slot holding this event, if scheduled.
    pub fn owner(&self) -> Option<EventHandle> {
        self.owner
    }

    pub fn is_scheduled(&self) -> bool {
        self.owner.is_some()
    }

    pub(crate) fn attach(&mut self, handle: EventHandle) {
        self.owner = Some(handle);
    }

    pub(crate) fn detach(mut self) -> Self {
        self.owner = None;
        self
    }
}
