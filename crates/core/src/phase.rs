//! Coarse simulation phases.

use std::fmt;
use thiserror::Error;
use tracing::info;

/// Lifecycle of a run. Entities and initial events are created in `Init`,
/// events execute in `Run`, and `Wrapup` collects results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
    #[default]
    Init,
    Run,
    Wrapup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "INIT"),
            Phase::Run => write!(f, "RUN"),
            Phase::Wrapup => write!(f, "WRAPUP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("Invalid phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Operation requires phase {required}, current phase is {current}")]
    WrongPhase { required: Phase, current: Phase },
}

/// Tracks the current phase and allows only `Init -> Run -> Wrapup`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseGate {
    current: Phase,
}

impl PhaseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn transition(&mut self, to: Phase) -> Result<(), PhaseError> {
        let allowed = matches!(
            (self.current, to),
            (Phase::Init, Phase::Run) | (Phase::Run, Phase::Wrapup)
        );
        if !allowed {
            return Err(PhaseError::InvalidTransition {
                from: self.current,
                to,
            });
        }
        info!(from = %self.current, to = %to, "Phase transition");
        self.current = to;
        Ok(())
    }

    pub fn require(&self, required: Phase) -> Result<(), PhaseError> {
        if self.current != required {
            return Err(PhaseError::WrongPhase {
                required,
                current: self.current,
            });
        }
        Ok(())
    }

    /// Whether sending new events is legal.
    pub fn can_send(&self) -> bool {
        self.current != Phase::Wrapup
    }
}
