//! Transport for one process of a distributed run.
//!
//! Envelopes for this process go straight into the shared queue. Envelopes
//! for other processes are encoded and sent through the [`Outbox`]; they
//! cannot be recalled once sent.

use crate::codec::{encode_frame, SHUTDOWN};
use crate::error::TransportError;
use crate::mesh::Outbox;
use parking_lot::Mutex;
use pdes_core::{EventHandle, EventInfo, EventQueue, Payload, Transport};
use pdes_types::{LpId, VirtualTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// The one queue both the listener and the main loop of a process touch.
pub type SharedQueue<P> = Arc<Mutex<EventQueue<P>>>;

pub fn shared_queue<P>() -> SharedQueue<P> {
    Arc::new(Mutex::new(EventQueue::new()))
}

/// The main loop's clock, readable by the listener for late-arrival checks.
#[derive(Debug, Clone, Default)]
pub struct SharedClock(Arc<AtomicU64>);

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> VirtualTime {
        VirtualTime(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, time: VirtualTime) {
        self.0.store(time.ticks(), Ordering::Release);
    }
}

/// Send counters for one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessTransportStats {
    pub enqueued_local: u64,
    pub sent_remote: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}

pub struct ProcessTransport<P> {
    id: LpId,
    queue: SharedQueue<P>,
    outbox: Outbox,
    next_sent: Option<VirtualTime>,
    stats: ProcessTransportStats,
}

impl<P: Payload> ProcessTransport<P> {
    pub fn new(id: LpId, queue: SharedQueue<P>, outbox: Outbox) -> Self {
        Self {
            id,
            queue,
            outbox,
            next_sent: None,
            stats: ProcessTransportStats::default(),
        }
    }

    pub fn id(&self) -> LpId {
        self.id
    }

    pub fn queue(&self) -> &SharedQueue<P> {
        &self.queue
    }

    pub fn stats(&self) -> ProcessTransportStats {
        self.stats
    }

    /// Earliest execution time sent to another process since the last call.
    pub fn take_next_sent(&mut self) -> Option<VirtualTime> {
        self.next_sent.take()
    }

    /// Tell this process's own listener to stop.
    pub fn shutdown_listener(&self) -> Result<(), TransportError> {
        self.outbox.send_command(self.id, SHUTDOWN)
    }

    fn send_remote(&mut self, dest: LpId, event: &EventInfo<P>) -> Result<(), TransportError> {
        let frame = encode_frame(event)?;
        let bytes = frame.len() as u64;
        self.outbox.send_envelope(dest, frame)?;
        self.stats.sent_remote += 1;
        self.stats.bytes_sent += bytes;
        self.next_sent = Some(match self.next_sent {
            Some(t) => t.min(event.time),
            None => event.time,
        });
        Ok(())
    }
}

impl<P: Payload> Transport<P> for ProcessTransport<P> {
    fn dispatch(&mut self, dest: LpId, event: EventInfo<P>) -> Option<EventHandle> {
        if dest == self.id {
            self.queue.lock().push(event);
            self.stats.enqueued_local += 1;
            return None;
        }
        if let Err(e) = self.send_remote(dest, &event) {
            self.stats.send_failures += 1;
            error!(
                from = %self.id,
                to = %dest,
                entity = %event.entity,
                time = %event.time,
                error = %e,
                "Failed to send event"
            );
        }
        None
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        warn!(lp = %self.id, %handle, "Events in the shared queue cannot be cancelled");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_envelope;
    use crate::frame::Frame;
    use crate::mesh::mesh;
    use pdes_types::{EntityId, ServiceAddress};

    fn envelope(time: u64) -> EventInfo<u64> {
        let mut event = EventInfo::new(
            EntityId::new('n', time),
            ServiceAddress(1),
            VirtualTime(5),
            time,
        );
        event.time = VirtualTime(time);
        event
    }

    #[test]
    fn test_local_and_remote_dispatch() {
        let mut endpoints = mesh(2);
        let remote = endpoints.pop().unwrap();
        let local = endpoints.pop().unwrap();

        let queue = shared_queue();
        let mut transport = ProcessTransport::new(LpId(0), queue.clone(), local.outbox);
        transport.dispatch(LpId(0), envelope(3));
        transport.dispatch(LpId(1), envelope(12));
        transport.dispatch(LpId(1), envelope(9));

        assert_eq!(queue.lock().len(), 1);
        assert_eq!(transport.take_next_sent(), Some(VirtualTime(9)));
        assert_eq!(transport.take_next_sent(), None);
        assert_eq!(transport.stats().sent_remote, 2);
        assert_eq!(remote.inbox.in_flight().pending(), 2);

        let mut source = remote.inbox.into_source();
        match source.next_frame().unwrap() {
            Some(Frame::Envelope(body)) => {
                let event: EventInfo<u64> = decode_envelope(body).unwrap();
                assert_eq!(event.time, VirtualTime(12));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_send_to_unknown_process_is_counted() {
        let endpoint = mesh(1).pop().unwrap();
        let mut transport = ProcessTransport::new(LpId(0), shared_queue(), endpoint.outbox);
        assert!(transport.dispatch(LpId(4), envelope(1)).is_none());
        assert_eq!(transport.stats().send_failures, 1);
        assert_eq!(transport.take_next_sent(), None);
    }

    #[test]
    fn test_shared_clock() {
        let clock = SharedClock::new();
        let reader = clock.clone();
        clock.set(VirtualTime(42));
        assert_eq!(reader.now(), VirtualTime(42));
    }
}
