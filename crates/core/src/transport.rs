//! Where sent envelopes go.
//!
//! An LP never stores events itself. It stamps an execution time on the
//! envelope and hands it to a [`Transport`], which is either the
//! single-process [`NativeTransport`] over an event list or the
//! cross-process transport that encodes remote envelopes onto the wire.

use crate::envelope::EventInfo;
use pdes_eventlist::{BoxedEventList, EventHandle, EventListKind, SimEvent};
use pdes_types::{LpId, VirtualTime};
use tracing::{debug, trace};

/// Accepts time-stamped envelopes for a destination LP.
///
/// # Guarantees
///
/// - The envelope's `time` is already stamped and respects lookahead.
/// - A transport never reorders envelopes relative to their timestamps; the
///   consuming loop always sees the smallest pending time first.
pub trait Transport<P>: Send {
    /// Accept an envelope for `dest`.
    ///
    /// # Returns
    ///
    /// A handle if the envelope is resident in a local event list and can
    /// still be cancelled, `None` if it left this process.
    fn dispatch(&mut self, dest: LpId, event: EventInfo<P>) -> Option<EventHandle>;

    /// Cancel a locally resident envelope.
    ///
    /// Returns `false` if the event already executed or cannot be recalled.
    fn cancel(&mut self, _handle: EventHandle) -> bool {
        false
    }
}

/// An envelope tagged with the LP that will execute it.
#[derive(Debug)]
pub struct Routed<P> {
    pub dest: LpId,
    pub event: EventInfo<P>,
}

/// Single-process transport: every LP shares one pending event list.
pub struct NativeTransport<P> {
    list: BoxedEventList<VirtualTime, Routed<P>>,
}

impl<P: Send + Sync + 'static> NativeTransport<P> {
    pub fn new(kind: EventListKind, ladder_threshold: usize) -> Self {
        Self {
            list: kind.build(ladder_threshold),
        }
    }

    pub fn kind(&self) -> EventListKind {
        self.list.kind()
    }

    /// Pop the earliest pending envelope.
    pub fn pop_next(&mut self) -> Option<Routed<P>> {
        self.list.delete_min().map(SimEvent::into_payload)
    }

    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.list.peek_min().map(SimEvent::timestamp)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Move a pending envelope to a new execution time.
    pub fn reschedule(&mut self, handle: EventHandle, time: VirtualTime) -> bool {
        if !self.list.contains(handle) {
            return false;
        }
        self.list.adjust(handle, time);
        if let Some(scheduled) = self.list.get(handle) {
            trace!(%time, entity = %scheduled.payload().event.entity, "Rescheduled event");
        }
        true
    }

    /// Drop everything still pending and return how many were discarded.
    pub fn clear(&mut self) -> usize {
        let pending = self.list.len();
        self.list.clear();
        pending
    }
}

impl<P: Send + Sync + 'static> Transport<P> for NativeTransport<P> {
    fn dispatch(&mut self, dest: LpId, event: EventInfo<P>) -> Option<EventHandle> {
        trace!(lp = %dest, time = %event.time, entity = %event.entity, "Scheduled event");
        let time = event.time;
        let handle = self.list.insert(SimEvent::new(time, Routed { dest, event }));
        Some(handle)
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        // A handle from this list that no longer resolves belongs to an event
        // that already ran. A handle from another list is a structural error
        // and is left for the list to reject.
        if handle.list() == self.list.id() && !self.list.contains(handle) {
            debug!(%handle, "Cancel of an event that already executed");
            return false;
        }
        self.list.cancel(handle);
        trace!(%handle, "Cancelled event");
        true
    }
}
