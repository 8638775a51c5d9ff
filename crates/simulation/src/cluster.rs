//! Multi-process runner: one worker thread and one listener thread per
//! process, connected by an in-memory frame mesh.
//!
//! # Epoch loop
//!
//! ```text
//!   base = min over processes of (queue head)
//!   while base <= end_time:
//!       last = min(base + min_delay - 1, end_time)
//!       execute every queued event with time <= last
//!       barrier                      (every process stopped sending)
//!       wait until in_flight == 0    (every frame sent to us is queued)
//!       stop if last == end_time
//!       base = all_reduce_min(queue head)
//! ```
//!
//! No process can receive an event earlier than `base + min_delay`, because
//! every sender's clock is at least `base` and lookahead clamps remote
//! delays to `min_delay`. Everything up to `last` is therefore final once
//! the epoch starts. An empty cluster reduces to `VirtualTime::MAX`, which
//! ends the loop even when `end_time` is `MAX` itself.

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::stats::SimulationStats;
use pdes_core::{
    deliver_logged, Delivery, EventInfo, LogicalProcess, ModuloPlacement, Payload, Phase,
    Placement, SimContext,
};
use pdes_transport::{
    mesh, shared_queue, Inbox, InFlight, Listener, ListenerStats, LocalReducer, MinReducer,
    ProcessTransport, SharedClock, SharedQueue, TransportError,
};
use pdes_types::{EntityId, LpId, ServiceAddress, VirtualTime};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Results of a cluster run.
#[derive(Debug)]
pub struct ClusterReport<D> {
    /// Counters summed over every process.
    pub total: SimulationStats,
    /// Counters per process, indexed by LP.
    pub per_process: Vec<SimulationStats>,
    /// Each process's delivery, returned after the run.
    pub deliveries: Vec<D>,
}

/// Runs `config.processes` workers, each with one LP, on scoped threads.
pub struct ClusterRunner<P, D> {
    config: SimulationConfig,
    placement: Arc<dyn Placement>,
    deliveries: Vec<D>,
    initial: Vec<EventInfo<P>>,
}

impl<P, D> ClusterRunner<P, D>
where
    P: Payload,
    D: Delivery<P>,
{
    /// Create a runner with round-robin placement; `make_delivery` builds the
    /// delivery for each process.
    pub fn new<F>(config: SimulationConfig, make_delivery: F) -> Result<Self, SimulationError>
    where
        F: FnMut(LpId) -> D,
    {
        let placement = Arc::new(ModuloPlacement::new(config.processes));
        Self::with_placement(config, placement, make_delivery)
    }

    pub fn with_placement<F>(
        config: SimulationConfig,
        placement: Arc<dyn Placement>,
        make_delivery: F,
    ) -> Result<Self, SimulationError>
    where
        F: FnMut(LpId) -> D,
    {
        config.validate()?;
        config.validate_placement(placement.as_ref())?;
        let deliveries = (0..config.processes).map(LpId).map(make_delivery).collect();
        Ok(Self {
            config,
            placement,
            deliveries,
            initial: Vec::new(),
        })
    }

    /// Schedule an initial event at an absolute time.
    pub fn schedule(
        &mut self,
        entity: EntityId,
        service: ServiceAddress,
        at: VirtualTime,
        payload: P,
    ) -> Result<(), SimulationError> {
        if at < self.config.start_time {
            return Err(SimulationError::ScheduleBeforeStart {
                time: at,
                start: self.config.start_time,
            });
        }
        let delay = at.saturating_sub(self.config.start_time);
        let mut event = EventInfo::new(entity, service, delay, payload);
        event.time = at;
        self.initial.push(event);
        Ok(())
    }

    /// Run every process to completion.
    pub fn run(self) -> Result<ClusterReport<D>, SimulationError> {
        let processes = self.config.processes;
        info!(
            processes,
            min_delay = %self.config.min_delay,
            end_time = %self.config.end_time,
            "Cluster run started"
        );

        let queues: Vec<SharedQueue<P>> = (0..processes).map(|_| shared_queue()).collect();
        for event in self.initial {
            let owner = self.placement.owner_checked(event.entity)?;
            queues[owner.index()].lock().push(event);
        }

        let reducer = Arc::new(LocalReducer::new(processes as usize));
        let workers: Vec<Worker<P, D>> = mesh(processes)
            .into_iter()
            .zip(queues)
            .zip(self.deliveries)
            .map(|((endpoint, queue), delivery)| {
                let id = endpoint.inbox.id();
                let lp = LogicalProcess::new(
                    id,
                    self.config.seed,
                    self.config.lookahead(),
                    Arc::clone(&self.placement),
                )
                .with_start_time(self.config.start_time);
                Worker {
                    id,
                    lp,
                    in_flight: endpoint.inbox.in_flight(),
                    inbox: Some(endpoint.inbox),
                    transport: ProcessTransport::new(id, Arc::clone(&queue), endpoint.outbox),
                    queue,
                    clock: SharedClock::new(),
                    reducer: Arc::clone(&reducer),
                    delivery,
                    config: self.config.clone(),
                }
            })
            .collect();

        let results: Vec<Result<(SimulationStats, D), SimulationError>> = thread::scope(|scope| {
            let handles: Vec<_> = workers
                .into_iter()
                .map(|worker| {
                    let id = worker.id;
                    let handle = thread::Builder::new()
                        .name(format!("worker-{}", id.0))
                        .spawn_scoped(scope, move || worker.run());
                    if handle.is_err() {
                        // Workers already running would wait for this one forever.
                        reducer.abort();
                    }
                    (id, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(id, handle)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(SimulationError::WorkerPanicked(id))),
                    Err(e) => Err(SimulationError::Spawn(e)),
                })
                .collect()
        });

        let mut total = SimulationStats::default();
        let mut per_process = Vec::with_capacity(results.len());
        let mut deliveries = Vec::with_capacity(results.len());
        for result in results {
            let (stats, delivery) = result?;
            total.merge(&stats);
            per_process.push(stats);
            deliveries.push(delivery);
        }
        info!(stats = %total, "Cluster run finished");

        Ok(ClusterReport {
            total,
            per_process,
            deliveries,
        })
    }
}

/// Aborts the reducer if the worker unwinds, so its peers stop waiting.
struct AbortOnPanic<'a>(&'a dyn MinReducer);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

struct Worker<P, D> {
    id: LpId,
    lp: LogicalProcess,
    inbox: Option<Inbox>,
    in_flight: Arc<InFlight>,
    transport: ProcessTransport<P>,
    queue: SharedQueue<P>,
    clock: SharedClock,
    reducer: Arc<LocalReducer>,
    delivery: D,
    config: SimulationConfig,
}

impl<P, D> Worker<P, D>
where
    P: Payload,
    D: Delivery<P>,
{
    fn run(mut self) -> Result<(SimulationStats, D), SimulationError> {
        let reducer = Arc::clone(&self.reducer);
        let _guard = AbortOnPanic(reducer.as_ref());

        let listener = match self.start_listener() {
            Ok(listener) => listener,
            Err(e) => {
                reducer.abort();
                return Err(e);
            }
        };

        let mut stats = SimulationStats::default();
        let outcome = self.epochs(&mut stats);
        if outcome.is_err() {
            reducer.abort();
        }

        let listener_stats = self.stop_listener(listener);
        outcome?;
        stats.record_listener(listener_stats?);

        self.lp.transition(Phase::Wrapup)?;
        stats.record_lp(self.lp.stats());
        stats.unprocessed = self.queue.lock().finalize() as u64;
        stats.final_time = self.lp.now();
        debug!(lp = %self.id, %stats, "Worker finished");

        Ok((stats, self.delivery))
    }

    fn start_listener(
        &mut self,
    ) -> Result<JoinHandle<Result<ListenerStats, TransportError>>, SimulationError> {
        let Some(inbox) = self.inbox.take() else {
            return Err(SimulationError::Transport(TransportError::ListenerStopped {
                pending: self.in_flight.pending(),
            }));
        };
        let handle = Listener::new(
            self.id,
            inbox.into_source(),
            Arc::clone(&self.queue),
            self.clock.clone(),
        )
        .with_in_flight(Arc::clone(&self.in_flight))
        .spawn()?;
        Ok(handle)
    }

    fn stop_listener(
        &self,
        listener: JoinHandle<Result<ListenerStats, TransportError>>,
    ) -> Result<ListenerStats, SimulationError> {
        self.transport.shutdown_listener()?;
        match listener.join() {
            Ok(result) => Ok(result?),
            Err(_) => Err(SimulationError::WorkerPanicked(self.id)),
        }
    }

    fn queue_head(&self) -> VirtualTime {
        self.queue.lock().peek_time().unwrap_or(VirtualTime::MAX)
    }

    fn epochs(&mut self, stats: &mut SimulationStats) -> Result<(), SimulationError> {
        self.lp.transition(Phase::Run)?;
        let end = self.config.end_time;
        // With one process there is no remote traffic, so a zero lookahead
        // still has to move the window forward by one tick.
        let span = VirtualTime(self.config.min_delay.ticks().saturating_sub(1));

        let mut base = self.reducer.all_reduce_min(self.queue_head())?;
        while base <= end {
            stats.epochs += 1;
            let last = base.saturating_add(span).min(end);
            self.execute_through(last, stats)?;

            self.reducer.barrier()?;
            self.in_flight.wait_idle()?;

            // Every process computes the same `last`, so all of them stop in
            // the same epoch.
            if last == end {
                break;
            }

            let mut next = self.queue_head();
            if let Some(sent) = self.transport.take_next_sent() {
                next = next.min(sent);
            }
            base = self.reducer.all_reduce_min(next)?;
            debug!(lp = %self.id, %last, next = %base, "Epoch finished");
        }
        Ok(())
    }

    fn execute_through(
        &mut self,
        last: VirtualTime,
        stats: &mut SimulationStats,
    ) -> Result<(), SimulationError> {
        loop {
            // The guard must be released before delivery, which may push
            // local sends into the same queue.
            let next = self.queue.lock().pop_through(last);
            let Some(event) = next else {
                return Ok(());
            };
            if event.time < self.lp.now() {
                warn!(
                    lp = %self.id,
                    time = %event.time,
                    now = %self.lp.now(),
                    "Executing late event"
                );
            }
            self.lp.advance_to(event.time)?;
            self.clock.set(self.lp.now());

            let mut ctx = SimContext::new(&mut self.lp, &mut self.transport);
            if deliver_logged(&mut self.delivery, &mut ctx, event) {
                stats.events_executed += 1;
            } else {
                stats.events_dropped += 1;
            }
        }
    }
}
