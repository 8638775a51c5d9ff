//! Time-ordered multi-map of envelopes.
//!
//! The cross-process transport keeps pending envelopes here rather than in an
//! [`EventList`](pdes_eventlist::EventList): it needs no cancel or adjust,
//! and a plain ordered map is easy to share behind one mutex between the
//! listener thread and the main loop.

use crate::envelope::EventInfo;
use pdes_types::VirtualTime;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Envelopes keyed by execution time. Equal times pop in insertion order.
pub struct EventQueue<P> {
    entries: BTreeMap<(VirtualTime, u64), EventInfo<P>>,
    next_seq: u64,
}

impl<P> Default for EventQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventQueue<P> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert an envelope keyed by its stamped execution time.
    pub fn push(&mut self, event: EventInfo<P>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((event.time, seq), event);
    }

    pub fn pop_min(&mut self) -> Option<EventInfo<P>> {
        self.entries.pop_first().map(|(_, event)| event)
    }

    /// Pop the head only if its time is at or before `last`.
    pub fn pop_through(&mut self, last: VirtualTime) -> Option<EventInfo<P>> {
        match self.entries.first_key_value() {
            Some(((time, _), _)) if *time <= last => self.pop_min(),
            _ => None,
        }
    }

    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.entries.keys().next().map(|(time, _)| *time)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Envelopes pushed over the queue's lifetime.
    pub fn total_pushed(&self) -> u64 {
        self.next_seq
    }

    /// Drop whatever is still queued at the end of a run and return how many
    /// envelopes were discarded.
    pub fn finalize(&mut self) -> usize {
        let leftover = self.entries.len();
        if leftover > 0 {
            warn!(
                leftover,
                first = ?self.peek_time(),
                "Event queue finalized with unprocessed events"
            );
        }
        self.entries.clear();
        leftover
    }
}

impl<P> fmt::Display for EventQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entries.first_key_value() {
            Some(((time, _), head)) => write!(
                f,
                "EventQueue(len={}, head={} -> {})",
                self.len(),
                time,
                head.entity
            ),
            None => write!(f, "EventQueue(empty)"),
        }
    }
}

impl<P> fmt::Debug for EventQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdes_types::{EntityId, ServiceAddress};
    use tracing_test::traced_test;

    fn at(time: u64, tag: u64) -> EventInfo<u64> {
        let mut info = EventInfo::new(
            EntityId::new('n', tag),
            ServiceAddress(1),
            VirtualTime::ZERO,
            tag,
        );
        info.time = VirtualTime(time);
        info
    }

    #[test]
    fn test_equal_times_pop_in_insertion_order() {
        let mut queue = EventQueue::new();
        queue.push(at(5, 1));
        queue.push(at(3, 2));
        queue.push(at(5, 3));
        queue.push(at(3, 4));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop_min().map(|e| *e.payload)).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
        assert_eq!(queue.total_pushed(), 4);
    }

    #[test]
    fn test_pop_through_is_inclusive() {
        let mut queue = EventQueue::new();
        queue.push(at(10, 1));
        assert!(queue.pop_through(VirtualTime(9)).is_none());
        assert_eq!(queue.peek_time(), Some(VirtualTime(10)));
        assert!(queue.pop_through(VirtualTime(10)).is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_through_max_time() {
        let mut queue = EventQueue::new();
        queue.push(at(u64::MAX, 1));
        assert!(queue.pop_through(VirtualTime::MAX).is_some());
        assert!(queue.pop_through(VirtualTime::MAX).is_none());
    }

    #[test]
    fn test_display_shows_head() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.to_string(), "EventQueue(empty)");
        queue.push(at(7, 2));
        assert_eq!(queue.to_string(), "EventQueue(len=1, head=7 -> (n, 2))");
    }

    #[traced_test]
    #[test]
    fn test_finalize_warns_about_leftovers() {
        let mut queue = EventQueue::new();
        queue.push(at(1, 1));
        queue.push(at(2, 2));
        assert_eq!(queue.finalize(), 2);
        assert!(queue.is_empty());
        assert!(logs_contain("unprocessed events"));
    }
}
