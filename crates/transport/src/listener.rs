//! The per-process listener thread.
//!
//! ```text
//!   peers ──frames──► StreamFrameSource ──► decode ──► lock ──► EventQueue
//!                                                        │
//!                                          in_flight.done()
//! ```
//!
//! The listener owns no simulation state beyond the shared queue it pushes
//! into. It stops on the `q` command, on a clean end of stream, or on a
//! malformed length, which desynchronizes the stream for good.

use crate::codec::{decode_envelope, SHUTDOWN};
use crate::error::TransportError;
use crate::frame::{Frame, StreamFrameSource};
use crate::in_flight::InFlight;
use crate::process::{SharedClock, SharedQueue};
use pdes_core::{EventInfo, Payload};
use pdes_types::LpId;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Counters reported when a listener exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub frames: u64,
    pub envelopes: u64,
    pub decode_errors: u64,
    pub unknown_commands: u64,
    /// Envelopes that arrived stamped earlier than the main loop's clock.
    pub late_arrivals: u64,
}

/// Everything a listener needs, passed in explicitly.
pub struct Listener<R, P> {
    id: LpId,
    source: StreamFrameSource<R>,
    queue: SharedQueue<P>,
    clock: SharedClock,
    in_flight: Option<Arc<InFlight>>,
}

impl<R: Read, P: Payload> Listener<R, P> {
    pub fn new(
        id: LpId,
        source: StreamFrameSource<R>,
        queue: SharedQueue<P>,
        clock: SharedClock,
    ) -> Self {
        Self {
            id,
            source,
            queue,
            clock,
            in_flight: None,
        }
    }

    /// Report every processed envelope frame to `in_flight`.
    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    /// Run the receive loop on the current thread.
    pub fn run(mut self) -> Result<ListenerStats, TransportError> {
        info!(lp = %self.id, "Listener started");
        let result = self.receive_loop();
        if let Some(in_flight) = &self.in_flight {
            in_flight.close();
        }
        match &result {
            Ok(stats) => info!(
                lp = %self.id,
                envelopes = stats.envelopes,
                decode_errors = stats.decode_errors,
                "Listener stopped"
            ),
            Err(e) => error!(lp = %self.id, error = %e, "Listener failed"),
        }
        result
    }

    fn receive_loop(&mut self) -> Result<ListenerStats, TransportError> {
        let mut stats = ListenerStats::default();
        loop {
            let frame = match self.source.next_frame()? {
                Some(frame) => frame,
                None => {
                    debug!(lp = %self.id, "Frame source closed");
                    return Ok(stats);
                }
            };
            stats.frames += 1;

            match frame {
                Frame::Command(SHUTDOWN) => return Ok(stats),
                Frame::Command(command) => {
                    stats.unknown_commands += 1;
                    error!(lp = %self.id, command, "Unknown listener command");
                }
                Frame::Envelope(body) => {
                    match decode_envelope::<P>(body) {
                        Ok(event) => {
                            if accept(self.id, &self.queue, &self.clock, event) {
                                stats.late_arrivals += 1;
                            }
                            stats.envelopes += 1;
                        }
                        Err(e) => {
                            stats.decode_errors += 1;
                            error!(lp = %self.id, error = %e, "Discarding undecodable frame");
                        }
                    }
                    if let Some(in_flight) = &self.in_flight {
                        in_flight.done();
                    }
                }
            }
        }
    }
}

/// Enqueue a decoded envelope; returns whether it arrived late.
fn accept<P>(id: LpId, queue: &SharedQueue<P>, clock: &SharedClock, event: EventInfo<P>) -> bool {
    let now = clock.now();
    let late = event.time < now;
    if late {
        warn!(
            lp = %id,
            entity = %event.entity,
            time = %event.time,
            %now,
            "Event arrived behind the local clock"
        );
    }
    queue.lock().push(event);
    late
}

impl<R, P> Listener<R, P>
where
    R: Read + Send + 'static,
    P: Payload,
{
    /// Run the receive loop on a dedicated thread.
    pub fn spawn(self) -> io::Result<JoinHandle<Result<ListenerStats, TransportError>>> {
        thread::Builder::new()
            .name(format!("listener-{}", self.id.0))
            .spawn(move || self.run())
    }
}
