//! Pending-event lists for discrete-event simulation.
//!
//! Three interchangeable implementations of [`EventList`]:
//!
//! | list | insert | delete-min | cancel / adjust |
//! |------|--------|------------|-----------------|
//! | [`BinaryHeap`] | O(log n) | O(log n) | O(log n) |
//! | [`SplayTree`] | amortized O(log n) | O(1) unlink + local min search | amortized O(log n) |
//! | [`LadderQueue`] | amortized O(1) | amortized O(1) | O(1) unlink + reroute |
//!
//! Lists own the events they hold. Inserting returns an [`EventHandle`]
//! (list id, arena slot, generation) which later names the event for
//! `cancel` and `adjust`; a handle from another list, or one whose event was
//! already removed, is a [`StructuralError`].
//!
//! # Example
//!
//! ```
//! use pdes_eventlist::{EventList, EventListKind, SimEvent};
//!
//! let mut list = EventListKind::LadderQueue.build_default::<u64, &str>();
//! let late = list.insert(SimEvent::new(30, "late"));
//! list.insert(SimEvent::new(10, "early"));
//! list.adjust(late, 5);
//! assert_eq!(list.delete_min().map(|e| *e.payload()), Some("late"));
//! ```

mod arena;
mod binary_heap;
mod error;
mod event;
mod ladder;
mod list;
mod splay_tree;

pub use binary_heap::BinaryHeap;
pub use error::StructuralError;
pub use event::{EventHandle, ListId, SimEvent};
pub use ladder::{LadderQueue, LadderStats, TierCounts, DEFAULT_THRESHOLD, MAX_RUNGS};
pub use list::{BoxedEventList, EventList, EventListKind};
pub use splay_tree::SplayTree;
