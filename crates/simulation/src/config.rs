//! Run configuration shared by both runners.

use pdes_core::{Lookahead, Placement};
use pdes_eventlist::{EventListKind, DEFAULT_THRESHOLD};
use pdes_types::VirtualTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("end_time {end} is before start_time {start}")]
    EndBeforeStart {
        start: VirtualTime,
        end: VirtualTime,
    },

    #[error("At least one process is required")]
    NoProcesses,

    #[error("min_delay must be at least 1 with {0} processes")]
    ZeroLookahead(u32),

    #[error("ladder_threshold must be at least 1")]
    ZeroLadderThreshold,

    #[error("Placement spans {placement} LPs, but the run has {processes} processes")]
    PlacementMismatch { placement: u32, processes: u32 },
}

/// Configuration for a simulation run.
///
/// Every field has a default, so a TOML file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Cross-process lookahead floor.
    pub min_delay: VirtualTime,

    /// Same-LP lookahead floor.
    pub local_min_delay: VirtualTime,

    /// Clock value every LP starts at.
    pub start_time: VirtualTime,

    /// Last time at which events still execute.
    pub end_time: VirtualTime,

    /// Pending-event list used by the native runner.
    pub event_list: EventListKind,

    /// Bucket threshold when `event_list` is the ladder queue.
    pub ladder_threshold: usize,

    /// Seed for every LP's random stream.
    pub seed: u64,

    /// LPs in the native runner, worker threads in the cluster runner.
    pub processes: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_delay: VirtualTime(1),
            local_min_delay: VirtualTime::ZERO,
            start_time: VirtualTime::ZERO,
            end_time: VirtualTime(1_000),
            event_list: EventListKind::default(),
            ladder_threshold: DEFAULT_THRESHOLD,
            seed: 12345,
            processes: 1,
        }
    }
}

impl SimulationConfig {
    /// Set both lookahead floors.
    pub fn with_lookahead(mut self, min_delay: u64, local_min_delay: u64) -> Self {
        self.min_delay = VirtualTime(min_delay);
        self.local_min_delay = VirtualTime(local_min_delay);
        self
    }

    /// Set the time window.
    pub fn with_window(mut self, start: u64, end: u64) -> Self {
        self.start_time = VirtualTime(start);
        self.end_time = VirtualTime(end);
        self
    }

    pub fn with_end_time(mut self, end: u64) -> Self {
        self.end_time = VirtualTime(end);
        self
    }

    pub fn with_event_list(mut self, kind: EventListKind) -> Self {
        self.event_list = kind;
        self
    }

    pub fn with_ladder_threshold(mut self, threshold: usize) -> Self {
        self.ladder_threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_processes(mut self, processes: u32) -> Self {
        self.processes = processes;
        self
    }

    pub fn lookahead(&self) -> Lookahead {
        Lookahead::new(self.min_delay, self.local_min_delay)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_time < self.start_time {
            return Err(ConfigError::EndBeforeStart {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.processes == 0 {
            return Err(ConfigError::NoProcesses);
        }
        // Without lookahead no process can ever prove it is safe to advance.
        if self.processes > 1 && self.min_delay == VirtualTime::ZERO {
            return Err(ConfigError::ZeroLookahead(self.processes));
        }
        if self.ladder_threshold == 0 {
            return Err(ConfigError::ZeroLadderThreshold);
        }
        Ok(())
    }

    /// Check that `placement` maps entities onto exactly the LPs this run
    /// creates.
    pub fn validate_placement(&self, placement: &dyn Placement) -> Result<(), ConfigError> {
        let lps = placement.num_lps();
        if lps != self.processes {
            return Err(ConfigError::PlacementMismatch {
                placement: lps,
                processes: self.processes,
            });
        }
        Ok(())
    }
}
