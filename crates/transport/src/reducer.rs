//! Epoch synchronization between processes.

use crate::error::TransportError;
use parking_lot::{Condvar, Mutex};
use pdes_types::VirtualTime;
use tracing::warn;

/// Collective operations every process calls once per epoch.
pub trait MinReducer: Send + Sync {
    /// Contribute `value` and block until every process has; returns the
    /// smallest contribution.
    fn all_reduce_min(&self, value: VirtualTime) -> Result<VirtualTime, TransportError>;

    /// Block until every process arrives.
    fn barrier(&self) -> Result<(), TransportError> {
        self.all_reduce_min(VirtualTime::MAX).map(|_| ())
    }

    /// Release every waiter with an error. Used when a process fails, so its
    /// peers do not wait for it forever.
    fn abort(&self);
}

#[derive(Debug)]
struct Round {
    arrived: usize,
    generation: u64,
    current: VirtualTime,
    result: VirtualTime,
    aborted: bool,
}

/// Reducer for processes that are threads of one OS process.
#[derive(Debug)]
pub struct LocalReducer {
    parties: usize,
    round: Mutex<Round>,
    released: Condvar,
}

impl LocalReducer {
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            round: Mutex::new(Round {
                arrived: 0,
                generation: 0,
                current: VirtualTime::MAX,
                result: VirtualTime::MAX,
                aborted: false,
            }),
            released: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }
}

impl MinReducer for LocalReducer {
    fn all_reduce_min(&self, value: VirtualTime) -> Result<VirtualTime, TransportError> {
        let mut round = self.round.lock();
        if round.aborted {
            return Err(TransportError::ReducerAborted);
        }

        let generation = round.generation;
        round.current = round.current.min(value);
        round.arrived += 1;

        if round.arrived == self.parties {
            // The result stays readable until the next round completes, and
            // that needs every waiter of this round to arrive again first.
            round.result = round.current;
            round.current = VirtualTime::MAX;
            round.arrived = 0;
            round.generation += 1;
            self.released.notify_all();
            return Ok(round.result);
        }

        while round.generation == generation && !round.aborted {
            self.released.wait(&mut round);
        }
        if round.generation == generation {
            return Err(TransportError::ReducerAborted);
        }
        Ok(round.result)
    }

    fn abort(&self) {
        let mut round = self.round.lock();
        if !round.aborted {
            warn!(arrived = round.arrived, "Aborting epoch synchronization");
        }
        round.aborted = true;
        self.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_all_reduce_min_across_threads() {
        let reducer = Arc::new(LocalReducer::new(4));
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let reducer = Arc::clone(&reducer);
                thread::spawn(move || {
                    let first = reducer.all_reduce_min(VirtualTime(10 + i)).unwrap();
                    reducer.barrier().unwrap();
                    let second = reducer.all_reduce_min(VirtualTime(100 - i)).unwrap();
                    (first, second)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (VirtualTime(10), VirtualTime(97)));
        }
    }

    #[test]
    fn test_single_party_returns_immediately() {
        let reducer = LocalReducer::new(1);
        assert_eq!(
            reducer.all_reduce_min(VirtualTime(3)).unwrap(),
            VirtualTime(3)
        );
        reducer.barrier().unwrap();
    }

    #[test]
    fn test_abort_releases_waiters() {
        let reducer = Arc::new(LocalReducer::new(2));
        let waiter = {
            let reducer = Arc::clone(&reducer);
            thread::spawn(move || reducer.all_reduce_min(VirtualTime(1)))
        };
        // Give the waiter a chance to block; abort works either way.
        thread::sleep(std::time::Duration::from_millis(10));
        reducer.abort();

        assert!(matches!(
            waiter.join().unwrap(),
            Err(TransportError::ReducerAborted)
        ));
        assert!(reducer.barrier().is_err());
    }
}
