//! Single-process runner over one shared event list.

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::stats::SimulationStats;
use pdes_core::{
    deliver_logged, Delivery, EventHandle, EventInfo, LogicalProcess, ModuloPlacement,
    NativeTransport, Phase, Placement, SimContext, Transport,
};
use pdes_types::{EntityId, LpId, ServiceAddress, VirtualTime};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs every LP of a simulation on the calling thread.
///
/// All LPs share one pending-event list of the configured kind, so events
/// execute in global timestamp order and lookahead only shapes delays.
pub struct NativeRunner<P, D> {
    config: SimulationConfig,
    lps: Vec<LogicalProcess>,
    transport: NativeTransport<P>,
    delivery: D,
    stats: SimulationStats,
}

impl<P, D> NativeRunner<P, D>
where
    P: Send + Sync + 'static,
    D: Delivery<P>,
{
    /// Create a runner with round-robin placement over `config.processes`
    /// LPs.
    pub fn new(config: SimulationConfig, delivery: D) -> Result<Self, SimulationError> {
        let placement = Arc::new(ModuloPlacement::new(config.processes));
        Self::with_placement(config, placement, delivery)
    }

    pub fn with_placement(
        config: SimulationConfig,
        placement: Arc<dyn Placement>,
        delivery: D,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        config.validate_placement(placement.as_ref())?;
        let lookahead = config.lookahead();
        let lps = (0..config.processes)
            .map(|id| {
                LogicalProcess::new(LpId(id), config.seed, lookahead, Arc::clone(&placement))
                    .with_start_time(config.start_time)
            })
            .collect();
        let transport = NativeTransport::new(config.event_list, config.ladder_threshold);
        info!(
            lps = config.processes,
            event_list = %config.event_list,
            end_time = %config.end_time,
            "Native runner created"
        );

        Ok(Self {
            config,
            lps,
            transport,
            delivery,
            stats: SimulationStats::default(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    pub fn delivery_mut(&mut self) -> &mut D {
        &mut self.delivery
    }

    pub fn lp(&self, id: LpId) -> Option<&LogicalProcess> {
        self.lps.get(id.index())
    }

    /// Events waiting to execute.
    pub fn pending(&self) -> usize {
        self.transport.len()
    }

    /// Schedule an initial event at an absolute time. Only legal before
    /// [`run`](Self::run).
    pub fn schedule(
        &mut self,
        entity: EntityId,
        service: ServiceAddress,
        at: VirtualTime,
        payload: P,
    ) -> Result<Option<EventHandle>, SimulationError> {
        if at < self.config.start_time {
            return Err(SimulationError::ScheduleBeforeStart {
                time: at,
                start: self.config.start_time,
            });
        }
        let event = EventInfo::new(entity, service, VirtualTime::ZERO, payload);
        Ok(self.lps[0].schedule_at(&mut self.transport, event, at)?)
    }

    /// Cancel a pending event. Returns `false` if it already executed.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.transport.cancel(handle)
    }

    /// Execute events in timestamp order until none remain at or before the
    /// end time.
    pub fn run(&mut self) -> Result<SimulationStats, SimulationError> {
        for lp in &mut self.lps {
            lp.transition(Phase::Run)?;
        }
        let end = self.config.end_time;
        info!(pending = self.transport.len(), %end, "Run started");

        while let Some(time) = self.transport.peek_time() {
            if time > end {
                break;
            }
            let Some(routed) = self.transport.pop_next() else {
                break;
            };
            let lp = &mut self.lps[routed.dest.index()];
            lp.advance_to(time)?;

            let mut ctx = SimContext::new(lp, &mut self.transport);
            if deliver_logged(&mut self.delivery, &mut ctx, routed.event) {
                self.stats.events_executed += 1;
            } else {
                self.stats.events_dropped += 1;
            }
            self.stats.final_time = time;
        }

        self.wrapup()
    }

    fn wrapup(&mut self) -> Result<SimulationStats, SimulationError> {
        for lp in &mut self.lps {
            lp.transition(Phase::Wrapup)?;
            self.stats.record_lp(lp.stats());
        }

        let leftover = self.transport.clear();
        if leftover > 0 {
            warn!(leftover, end = %self.config.end_time, "Events left past the end time");
        }
        self.stats.unprocessed = leftover as u64;

        for lp in &self.lps {
            debug!(lp = %lp.id(), now = %lp.now(), stats = ?lp.stats(), "LP finished");
        }
        info!(stats = %self.stats, "Run finished");
        Ok(self.stats)
    }
}
