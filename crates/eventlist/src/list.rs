//! The event-list contract and runtime selection of an implementation.

use crate::binary_heap::BinaryHeap;
use crate::error::{fatal, StructuralError};
use crate::event::{EventHandle, ListId, SimEvent};
use crate::ladder::{LadderQueue, DEFAULT_THRESHOLD};
use crate::splay_tree::SplayTree;
use pdes_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A priority queue of pending events ordered by timestamp.
///
/// Every implementation owns the events it holds and satisfies:
///
/// - `len()` equals the number of events whose owner handle names this list.
/// - `peek_min()` and `delete_min()` yield an event with the smallest
///   timestamp. Ties are broken arbitrarily but consistently.
///
/// The plain operations abort on a structural violation (see
/// [`StructuralError`]); the `try_*` forms return it.
pub trait EventList<T: Timestamp, E> {
    /// Identity checked against incoming handles.
    fn id(&self) -> ListId;

    fn kind(&self) -> EventListKind;

    /// Number of scheduled events.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The earliest event, if any.
    fn peek_min(&self) -> Option<&SimEvent<T, E>>;

    /// Remove and return the earliest event, detached.
    fn delete_min(&mut self) -> Option<SimEvent<T, E>>;

    /// Schedule a detached event.
    fn try_insert(&mut self, event: SimEvent<T, E>) -> Result<EventHandle, StructuralError>;

    /// Unschedule the event named by `handle` and hand it back detached.
    fn try_cancel(&mut self, handle: EventHandle) -> Result<SimEvent<T, E>, StructuralError>;

    /// Move a scheduled event to `timestamp`. The handle stays valid.
    fn try_adjust(&mut self, handle: EventHandle, timestamp: T) -> Result<(), StructuralError>;

    /// Look up a scheduled event.
    fn get(&self, handle: EventHandle) -> Option<&SimEvent<T, E>>;

    fn contains(&self, handle: EventHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Drop every scheduled event. Outstanding handles go stale.
    fn clear(&mut self);

    fn insert(&mut self, event: SimEvent<T, E>) -> EventHandle {
        self.try_insert(event).unwrap_or_else(|e| fatal(e))
    }

    /// Cancel and drop the event named by `handle`.
    fn cancel(&mut self, handle: EventHandle) {
        if let Err(e) = self.try_cancel(handle) {
            fatal(e);
        }
    }

    fn adjust(&mut self, handle: EventHandle, timestamp: T) {
        if let Err(e) = self.try_adjust(handle, timestamp) {
            fatal(e);
        }
    }
}

/// Boxed list usable from a worker thread.
pub type BoxedEventList<T, E> = Box<dyn EventList<T, E> + Send>;

/// Which implementation backs an event list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventListKind {
    /// Array-backed binary min-heap.
    #[default]
    BinaryHeap,
    /// Self-adjusting binary search tree.
    SplayTree,
    /// Multi-tier bucket queue.
    LadderQueue,
}

impl EventListKind {
    /// Build an empty list. `ladder_threshold` only applies to the ladder
    /// queue.
    pub fn build<T, E>(self, ladder_threshold: usize) -> BoxedEventList<T, E>
    where
        T: Timestamp,
        E: Send + 'static,
    {
        match self {
            EventListKind::BinaryHeap => Box::new(BinaryHeap::new()),
            EventListKind::SplayTree => Box::new(SplayTree::new()),
            EventListKind::LadderQueue => Box::new(LadderQueue::with_threshold(ladder_threshold)),
        }
    }

    /// Build an empty list with default tuning.
    pub fn build_default<T, E>(self) -> BoxedEventList<T, E>
    where
        T: Timestamp,
        E: Send + 'static,
    {
        self.build(DEFAULT_THRESHOLD)
    }

    /// Every implementation, for exhaustive tests and CLI help.
    pub const ALL: [EventListKind; 3] = [
        EventListKind::BinaryHeap,
        EventListKind::SplayTree,
        EventListKind::LadderQueue,
    ];
}

impl fmt::Display for EventListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventListKind::BinaryHeap => "binary_heap",
            EventListKind::SplayTree => "splay_tree",
            EventListKind::LadderQueue => "ladder_queue",
        };
        f.write_str(name)
    }
}

impl FromStr for EventListKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").to_ascii_lowercase().as_str() {
            "binary_heap" | "heap" => Ok(EventListKind::BinaryHeap),
            "splay_tree" | "splay" => Ok(EventListKind::SplayTree),
            "ladder_queue" | "ladder" => Ok(EventListKind::LadderQueue),
            other => Err(format!(
                "unknown event list '{other}' (expected binary_heap, splay_tree or ladder_queue)"
            )),
        }
    }
}

/// Reject timestamps that cannot be ordered.
pub(crate) fn check_timestamp<T: Timestamp>(timestamp: T) -> Result<(), StructuralError> {
    if timestamp.is_valid() {
        Ok(())
    } else {
        Err(StructuralError::InvalidTimestamp(timestamp.to_string()))
    }
}

/// Reject events that already sit in a list.
pub(crate) fn check_detached<T: Copy, E>(event: &SimEvent<T, E>) -> Result<(), StructuralError> {
    match event.owner() {
        Some(handle) => Err(StructuralError::AlreadyScheduled(handle)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_aliases() {
        assert_eq!("ladder".parse(), Ok(EventListKind::LadderQueue));
        assert_eq!("splay-tree".parse(), Ok(EventListKind::SplayTree));
        assert_eq!("BINARY_HEAP".parse(), Ok(EventListKind::BinaryHeap));
        assert!("calendar".parse::<EventListKind>().is_err());
    }

    #[test]
    fn test_kind_display_round_trips() {
        for kind in EventListKind::ALL {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }

    #[test]
    fn test_built_list_reports_kind() {
        for kind in EventListKind::ALL {
            let list: BoxedEventList<u64, ()> = kind.build_default();
            assert_eq!(list.kind(), kind);
            assert!(list.is_empty());
        }
    }
}
