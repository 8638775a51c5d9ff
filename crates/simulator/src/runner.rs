//! Drives one PHOLD run on the configured runner.

use crate::config::{RunMode, SimulatorConfig, SimulatorConfigError};
use crate::metrics::{MetricsCollector, SimulationReport};
use crate::phold::{PholdDelivery, PholdMessage, NODE_KIND, RECEIVER};
use pdes_simulation::{ClusterRunner, NativeRunner, SimulationError, SimulationStats};
use pdes_types::EntityId;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error(transparent)]
    Config(#[from] SimulatorConfigError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// A validated PHOLD run, ready to execute.
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Every initial event: `events_per_entity` messages on each node at the
    /// start time.
    fn initial_events(&self) -> impl Iterator<Item = EntityId> + '_ {
        let phold = &self.config.phold;
        (0..phold.entities).flat_map(move |number| {
            (0..phold.events_per_entity).map(move |_| EntityId::new(NODE_KIND, number))
        })
    }

    fn delivery(&self) -> PholdDelivery {
        PholdDelivery::new(&self.config.phold, self.config.simulation.min_delay)
    }

    /// Run to the configured end time.
    pub fn run(&self) -> Result<SimulationReport, SimulatorError> {
        let sim = &self.config.simulation;
        info!(
            mode = %self.config.mode,
            processes = sim.processes,
            entities = self.config.phold.entities,
            end_time = %sim.end_time,
            "Starting PHOLD"
        );

        let started = Instant::now();
        let mut metrics = MetricsCollector::new();
        let stats = match self.config.mode {
            RunMode::Native => self.run_native(&mut metrics)?,
            RunMode::Cluster => self.run_cluster(&mut metrics)?,
        };

        Ok(metrics.finish(
            self.config.mode,
            sim.processes,
            sim.event_list,
            stats,
            started.elapsed(),
        ))
    }

    fn run_native(
        &self,
        metrics: &mut MetricsCollector,
    ) -> Result<SimulationStats, SimulatorError> {
        let sim = &self.config.simulation;
        let mut runner = NativeRunner::new(sim.clone(), self.delivery())?;
        for entity in self.initial_events() {
            runner.schedule(entity, RECEIVER, sim.start_time, PholdMessage::default())?;
        }
        let stats = runner.run()?;
        metrics.record(runner.delivery());
        Ok(stats)
    }

    fn run_cluster(
        &self,
        metrics: &mut MetricsCollector,
    ) -> Result<SimulationStats, SimulatorError> {
        let sim = &self.config.simulation;
        let mut runner = ClusterRunner::new(sim.clone(), |_| self.delivery())?;
        for entity in self.initial_events() {
            runner.schedule(entity, RECEIVER, sim.start_time, PholdMessage::default())?;
        }
        let report = runner.run()?;
        for delivery in &report.deliveries {
            metrics.record(delivery);
        }
        Ok(report.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PholdConfig;
    use pdes_eventlist::EventListKind;
    use pdes_simulation::SimulationConfig;
    use pdes_types::VirtualTime;
    use tracing_test::traced_test;

    fn config(mode: RunMode) -> SimulatorConfig {
        SimulatorConfig::default()
            .with_mode(mode)
            .with_simulation(
                SimulationConfig::default()
                    .with_processes(4)
                    .with_lookahead(2, 0)
                    .with_end_time(300),
            )
            .with_phold(
                PholdConfig::default()
                    .with_entities(16)
                    .with_events_per_entity(2)
                    .with_mean_delay(3.0),
            )
    }

    #[test]
    fn test_initial_events_cover_population() {
        let simulator = Simulator::new(config(RunMode::Native)).unwrap();
        let events: Vec<EntityId> = simulator.initial_events().collect();
        assert_eq!(events.len(), 32);
        assert_eq!(events[0], EntityId::new('n', 0));
        assert_eq!(events[31], EntityId::new('n', 15));
    }

    #[test]
    fn test_native_run_keeps_population_constant() {
        let report = Simulator::new(config(RunMode::Native))
            .unwrap()
            .run()
            .unwrap();

        // Every execution forwards exactly one message.
        assert_eq!(report.stats.events_dropped, 0);
        assert_eq!(report.received, report.stats.events_executed);
        assert_eq!(report.stats.unprocessed, 32);
        assert_eq!(report.delays.len(), report.stats.events_executed);
        assert!(report.delays.min() >= 2);
        assert_eq!(report.stats.clamped_sends, 0);
        assert!(report.stats.final_time <= VirtualTime(300));
    }

    #[test]
    fn test_native_run_is_deterministic() {
        let a = Simulator::new(config(RunMode::Native))
            .unwrap()
            .run()
            .unwrap();
        let b = Simulator::new(config(RunMode::Native))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(a.stats, b.stats);
        assert_eq!(a.delays.mean(), b.delays.mean());
    }

    #[test]
    fn test_native_run_on_every_event_list() {
        for kind in EventListKind::ALL {
            let mut config = config(RunMode::Native);
            config.simulation = config.simulation.with_event_list(kind);
            let report = Simulator::new(config).unwrap().run().unwrap();
            assert!(report.stats.events_executed > 0, "{kind}");
            assert_eq!(report.stats.unprocessed, 32, "{kind}");
        }
    }

    #[test]
    fn test_cluster_run_keeps_population_constant() {
        let report = Simulator::new(config(RunMode::Cluster))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.stats.events_dropped, 0);
        assert_eq!(report.received, report.stats.events_executed);
        assert_eq!(report.stats.unprocessed, 32);
        assert_eq!(report.stats.late_arrivals, 0);
        assert_eq!(report.stats.clamped_sends, 0);
        assert!(report.stats.epochs > 0);
        assert!(report.stats.remote_sends > 0);
    }

    #[traced_test]
    #[test]
    fn test_run_logs_start() {
        let config = config(RunMode::Native)
            .with_simulation(SimulationConfig::default().with_end_time(10));
        Simulator::new(config).unwrap().run().unwrap();
        assert!(logs_contain("Starting PHOLD"));
        assert!(logs_contain("mode=native"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = config(RunMode::Native).with_phold(PholdConfig::default().with_entities(0));
        assert!(matches!(
            Simulator::new(config),
            Err(SimulatorError::Config(SimulatorConfigError::NoEntities))
        ));
    }
}
