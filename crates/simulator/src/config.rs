//! Configuration types for the simulator.
//!
//! A TOML file has two optional tables:
//!
//! ```toml
//! mode = "cluster"
//!
//! [simulation]
//! min_delay = 1
//! end_time = 50000
//! event_list = "ladder_queue"
//! processes = 4
//!
//! [phold]
//! entities = 64
//! events_per_entity = 2
//! mean_delay = 1.0
//! ```

use pdes_simulation::{ConfigError, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading or validating a simulator configuration.
#[derive(Debug, Error)]
pub enum SimulatorConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Simulation(#[from] ConfigError),

    #[error("phold.entities must be at least 1")]
    NoEntities,

    #[error("phold.mean_delay must be finite and non-negative, got {0}")]
    InvalidMeanDelay(f64),
}

/// Which runner executes the workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every LP on one thread over one event list.
    #[default]
    Native,

    /// One worker thread per process, synchronized in epochs.
    Cluster,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Native => f.write_str("native"),
            RunMode::Cluster => f.write_str("cluster"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(RunMode::Native),
            "cluster" => Ok(RunMode::Cluster),
            other => Err(format!(
                "unknown mode '{other}' (expected native or cluster)"
            )),
        }
    }
}

/// PHOLD workload parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PholdConfig {
    /// Number of entities, named `('n', 0..entities)`.
    pub entities: u64,

    /// Events scheduled on every entity at the start time.
    pub events_per_entity: u32,

    /// Mean of the exponential part of each forwarding delay, in ticks.
    pub mean_delay: f64,
}

impl Default for PholdConfig {
    fn default() -> Self {
        Self {
            entities: 4,
            events_per_entity: 1,
            mean_delay: 1.0,
        }
    }
}

impl PholdConfig {
    pub fn with_entities(mut self, entities: u64) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_events_per_entity(mut self, events: u32) -> Self {
        self.events_per_entity = events;
        self
    }

    pub fn with_mean_delay(mut self, mean: f64) -> Self {
        self.mean_delay = mean;
        self
    }

    pub fn validate(&self) -> Result<(), SimulatorConfigError> {
        if self.entities == 0 {
            return Err(SimulatorConfigError::NoEntities);
        }
        if !self.mean_delay.is_finite() || self.mean_delay < 0.0 {
            return Err(SimulatorConfigError::InvalidMeanDelay(self.mean_delay));
        }
        Ok(())
    }
}

/// Configuration for a simulator run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Runner to use.
    pub mode: RunMode,

    /// Kernel settings shared by both runners.
    pub simulation: SimulationConfig,

    /// Workload settings.
    pub phold: PholdConfig,
}

impl SimulatorConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulatorConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimulatorConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_phold(mut self, phold: PholdConfig) -> Self {
        self.phold = phold;
        self
    }

    /// Check both the kernel and the workload settings.
    pub fn validate(&self) -> Result<(), SimulatorConfigError> {
        self.simulation.validate()?;
        self.phold.validate()
    }
}

impl FromStr for SimulatorConfig {
    type Err = SimulatorConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdes_eventlist::EventListKind;
    use pdes_types::VirtualTime;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: SimulatorConfig = "".parse().unwrap();
        assert_eq!(config, SimulatorConfig::default());
        assert_eq!(config.mode, RunMode::Native);
    }

    #[test]
    fn test_parse_full_file() {
        let config: SimulatorConfig = r#"
            mode = "cluster"

            [simulation]
            min_delay = 3
            end_time = 500
            event_list = "splay_tree"
            processes = 4

            [phold]
            entities = 16
            mean_delay = 2.5
        "#
        .parse()
        .unwrap();

        assert_eq!(config.mode, RunMode::Cluster);
        assert_eq!(config.simulation.min_delay, VirtualTime(3));
        assert_eq!(config.simulation.event_list, EventListKind::SplayTree);
        assert_eq!(config.simulation.processes, 4);
        assert_eq!(config.phold.entities, 16);
        assert_eq!(config.phold.events_per_entity, 1);
        assert_eq!(config.phold.mean_delay, 2.5);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = "[phold]\nentites = 3\n".parse::<SimulatorConfig>();
        assert!(matches!(result, Err(SimulatorConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_bad_workload() {
        let config = SimulatorConfig::default().with_phold(PholdConfig::default().with_entities(0));
        assert!(matches!(
            config.validate(),
            Err(SimulatorConfigError::NoEntities)
        ));

        let config =
            SimulatorConfig::default().with_phold(PholdConfig::default().with_mean_delay(-1.0));
        assert!(matches!(
            config.validate(),
            Err(SimulatorConfigError::InvalidMeanDelay(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_simulation() {
        let config = SimulatorConfig::default()
            .with_simulation(SimulationConfig::default().with_processes(0));
        assert!(matches!(
            config.validate(),
            Err(SimulatorConfigError::Simulation(ConfigError::NoProcesses))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode = \"native\"\n[phold]\nentities = 9").unwrap();

        let config = SimulatorConfig::load(file.path()).unwrap();
        assert_eq!(config.phold.entities, 9);
    }

    #[test]
    fn test_load_missing_file() {
        let result = SimulatorConfig::load("/nonexistent/pdes-sim.toml");
        assert!(matches!(result, Err(SimulatorConfigError::Read { .. })));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Cluster".parse::<RunMode>().unwrap(), RunMode::Cluster);
        assert!("mpi".parse::<RunMode>().is_err());
    }
}
