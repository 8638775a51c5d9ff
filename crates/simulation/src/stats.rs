use pdes_core::LpStats;
use pdes_transport::ListenerStats;
use pdes_types::VirtualTime;
use serde::Serialize;
use std::fmt;

/// Counters collected over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Events accepted by their entity.
    pub events_executed: u64,
    /// Events whose delivery failed and were dropped.
    pub events_dropped: u64,
    /// Sends whose delay was raised to the lookahead floor.
    pub clamped_sends: u64,
    pub local_sends: u64,
    pub remote_sends: u64,
    /// Events still pending past the end time.
    pub unprocessed: u64,
    /// Synchronization rounds (cluster runner only).
    pub epochs: u64,
    /// Remote events that arrived behind the receiver's clock.
    pub late_arrivals: u64,
    /// Frames the listener could not decode.
    pub decode_errors: u64,
    /// Time of the last executed event.
    pub final_time: VirtualTime,
}

impl SimulationStats {
    pub(crate) fn record_lp(&mut self, lp: LpStats) {
        self.clamped_sends += lp.clamped;
        self.local_sends += lp.sent_local;
        self.remote_sends += lp.sent_remote;
    }

    pub(crate) fn record_listener(&mut self, listener: ListenerStats) {
        self.late_arrivals += listener.late_arrivals;
        self.decode_errors += listener.decode_errors;
    }

    /// Fold another process's counters into this one.
    ///
    /// Epochs are shared by every process of a run, so the larger count is
    /// kept rather than summed.
    pub fn merge(&mut self, other: &SimulationStats) {
        self.events_executed += other.events_executed;
        self.events_dropped += other.events_dropped;
        self.clamped_sends += other.clamped_sends;
        self.local_sends += other.local_sends;
        self.remote_sends += other.remote_sends;
        self.unprocessed += other.unprocessed;
        self.late_arrivals += other.late_arrivals;
        self.decode_errors += other.decode_errors;
        self.epochs = self.epochs.max(other.epochs);
        self.final_time = self.final_time.max(other.final_time);
    }
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "executed={} dropped={} clamped={} local={} remote={} unprocessed={} epochs={} final_time={}",
            self.events_executed,
            self.events_dropped,
            self.clamped_sends,
            self.local_sends,
            self.remote_sends,
            self.unprocessed,
            self.epochs,
            self.final_time
        )
    }
}
