//! Logical process: one clock, one random stream, and the send path.
//!
//! ```text
//!   send_event_info(envelope)
//!        │
//!        ├─ placement.find_owner(entity) ─► dest LP
//!        ├─ floor = local_min_delay if dest == self else min_delay
//!        ├─ delay < floor ? clamp + error!
//!        ├─ time = now + delay
//!        └─ transport.dispatch(dest, envelope)
//! ```

use crate::envelope::EventInfo;
use crate::lookahead::{Lookahead, SendScope};
use crate::phase::{Phase, PhaseError, PhaseGate};
use crate::placement::Placement;
use crate::transport::Transport;
use pdes_eventlist::EventHandle;
use pdes_types::{EntityId, LpId, VirtualTime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Per-LP send counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LpStats {
    pub sent_local: u64,
    pub sent_remote: u64,
    /// Sends whose delay was raised to the lookahead floor.
    pub clamped: u64,
    /// Sends discarded because the run was already wrapping up.
    pub discarded: u64,
}

/// One simulated clock domain.
///
/// The LP owns its clock and random stream exclusively. Storage of pending
/// events belongs to whatever [`Transport`] the runner passes in.
pub struct LogicalProcess {
    id: LpId,
    now: VirtualTime,
    rng: ChaCha8Rng,
    lookahead: Lookahead,
    placement: Arc<dyn Placement>,
    phase: PhaseGate,
    stats: LpStats,
}

impl LogicalProcess {
    pub fn new(id: LpId, seed: u64, lookahead: Lookahead, placement: Arc<dyn Placement>) -> Self {
        Self {
            id,
            now: VirtualTime::ZERO,
            rng: ChaCha8Rng::seed_from_u64(stream_seed(seed, id)),
            lookahead,
            placement,
            phase: PhaseGate::new(),
            stats: LpStats::default(),
        }
    }

    /// Start the clock somewhere other than zero. Only meaningful in `Init`.
    pub fn with_start_time(mut self, start: VirtualTime) -> Self {
        self.now = start;
        self
    }

    pub fn id(&self) -> LpId {
        self.id
    }

    /// Current simulated time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn lookahead(&self) -> Lookahead {
        self.lookahead
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    pub fn stats(&self) -> LpStats {
        self.stats
    }

    pub fn transition(&mut self, to: Phase) -> Result<(), PhaseError> {
        self.phase.transition(to)
    }

    /// Owning LP of `entity`.
    ///
    /// # Panics
    ///
    /// If placement names an LP outside the run. Routing to a nonexistent LP
    /// would silently lose the event.
    pub fn owner_of(&self, entity: EntityId) -> LpId {
        match self.placement.owner_checked(entity) {
            Ok(lp) => lp,
            Err(e) => {
                error!(lp = %self.id, error = %e, "Placement out of range");
                panic!("{e}");
            }
        }
    }

    /// Move the clock forward to `time`.
    ///
    /// Time never moves backwards; a regression is logged and ignored.
    pub fn advance_to(&mut self, time: VirtualTime) -> Result<(), PhaseError> {
        self.phase.require(Phase::Run)?;
        if time < self.now {
            warn!(lp = %self.id, now = %self.now, requested = %time, "Ignoring clock regression");
            return Ok(());
        }
        self.now = time;
        Ok(())
    }

    /// Turn a send request into a scheduled event.
    ///
    /// The delay is raised to the applicable lookahead floor if needed, the
    /// execution time `now + delay` is stamped on the envelope, and the
    /// envelope is handed to `transport`. Sends are fire-and-forget: an
    /// unknown destination entity surfaces at delivery, not here.
    pub fn send_event_info<P>(
        &mut self,
        transport: &mut dyn Transport<P>,
        mut event: EventInfo<P>,
    ) -> Option<EventHandle> {
        if !self.phase.can_send() {
            debug!(lp = %self.id, entity = %event.entity, "Discarding send during wrapup");
            self.stats.discarded += 1;
            return None;
        }

        let dest = self.owner_of(event.entity);
        let scope = if dest == self.id {
            self.stats.sent_local += 1;
            SendScope::Local
        } else {
            self.stats.sent_remote += 1;
            SendScope::Remote
        };

        event.delay = match self.lookahead.check(event.delay, scope) {
            Ok(delay) => delay,
            Err(violation) => {
                error!(
                    lp = %self.id,
                    entity = %event.entity,
                    requested = %violation.requested,
                    floor = %violation.floor,
                    "Lookahead violation, clamping delay"
                );
                self.stats.clamped += 1;
                violation.floor
            }
        };
        event.time = self.now + event.delay;

        trace!(
            lp = %self.id,
            dest = %dest,
            entity = %event.entity,
            time = %event.time,
            "Send"
        );
        transport.dispatch(dest, event)
    }

    /// Place an initial event at an absolute time.
    ///
    /// Bootstrap events are created before any clock runs, so no lookahead
    /// applies; only legal during `Init`.
    pub fn schedule_at<P>(
        &mut self,
        transport: &mut dyn Transport<P>,
        mut event: EventInfo<P>,
        time: VirtualTime,
    ) -> Result<Option<EventHandle>, PhaseError> {
        self.phase.require(Phase::Init)?;
        let dest = self.owner_of(event.entity);
        event.delay = time.saturating_sub(self.now);
        event.time = time;
        Ok(transport.dispatch(dest, event))
    }
}

impl std::fmt::Debug for LogicalProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalProcess")
            .field("id", &self.id)
            .field("now", &self.now)
            .field("phase", &self.phase.current())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Distinct, reproducible stream per LP.
fn stream_seed(seed: u64, id: LpId) -> u64 {
    let index = u64::from(id.0).wrapping_add(1);
    seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
