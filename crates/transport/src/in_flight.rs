//! Counting envelope frames between send and enqueue.

use crate::error::TransportError;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct State {
    pending: u64,
    closed: bool,
}

/// Envelopes sent to one process that its listener has not yet enqueued.
///
/// Senders call [`add`](Self::add) before a frame leaves; the receiving
/// listener calls [`done`](Self::done) once the envelope is in its queue (or
/// discarded). At an epoch boundary the receiving process waits for zero, so
/// its queue head is trustworthy.
#[derive(Debug, Default)]
pub struct InFlight {
    state: Mutex<State>,
    idle: Condvar,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.state.lock().pending += 1;
    }

    pub fn done(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            self.idle.notify_all();
        }
    }

    pub fn pending(&self) -> u64 {
        self.state.lock().pending
    }

    /// Block until nothing is in flight.
    ///
    /// Fails if the listener stopped while frames were still outstanding;
    /// they will never be enqueued.
    pub fn wait_idle(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        while state.pending > 0 && !state.closed {
            self.idle.wait(&mut state);
        }
        if state.pending > 0 {
            return Err(TransportError::ListenerStopped {
                pending: state.pending,
            });
        }
        Ok(())
    }

    /// Mark the listener as gone and wake every waiter.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.idle.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_idle_returns_once_drained() {
        let in_flight = Arc::new(InFlight::new());
        in_flight.add();
        in_flight.add();

        let worker = {
            let in_flight = Arc::clone(&in_flight);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                in_flight.done();
                in_flight.done();
            })
        };

        in_flight.wait_idle().unwrap();
        assert_eq!(in_flight.pending(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_close_with_pending_fails_waiters() {
        let in_flight = InFlight::new();
        in_flight.add();
        in_flight.close();
        assert!(matches!(
            in_flight.wait_idle(),
            Err(TransportError::ListenerStopped { pending: 1 })
        ));
    }
}
