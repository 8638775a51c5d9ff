use crate::config::ConfigError;
use pdes_core::{PhaseError, PlacementError};
use pdes_transport::TransportError;
use pdes_types::{LpId, VirtualTime};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("Cannot schedule at {time}, before start time {start}")]
    ScheduleBeforeStart {
        time: VirtualTime,
        start: VirtualTime,
    },

    #[error("Worker {0} panicked")]
    WorkerPanicked(LpId),
}
