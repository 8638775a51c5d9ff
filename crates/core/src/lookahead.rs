//! Lookahead floors for outgoing sends.
//!
//! Conservative synchronization only works if no event can land on another
//! process with less than `min_delay` of notice. A send that asks for less is
//! clamped up to the floor and reported, never allowed through.

use pdes_types::VirtualTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// The two delay floors, read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookahead {
    /// Floor for sends to another LP.
    pub min_delay: VirtualTime,
    /// Floor for sends that stay on the sending LP.
    pub local_min_delay: VirtualTime,
}

impl Default for Lookahead {
    fn default() -> Self {
        Self {
            min_delay: VirtualTime(1),
            local_min_delay: VirtualTime::ZERO,
        }
    }
}

/// A requested delay that fell below its floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{scope} delay {requested} below lookahead floor {floor}")]
pub struct LookaheadViolation {
    pub requested: VirtualTime,
    pub floor: VirtualTime,
    pub scope: SendScope,
}

/// Whether a send stays on the sending LP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendScope {
    Local,
    Remote,
}

impl fmt::Display for SendScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendScope::Local => write!(f, "local"),
            SendScope::Remote => write!(f, "remote"),
        }
    }
}

impl Lookahead {
    /// Create floors. A local floor above the remote one is unusual but
    /// allowed.
    pub fn new(min_delay: VirtualTime, local_min_delay: VirtualTime) -> Self {
        if local_min_delay > min_delay {
            warn!(
                %min_delay,
                %local_min_delay,
                "Local lookahead exceeds cross-process lookahead"
            );
        }
        Self {
            min_delay,
            local_min_delay,
        }
    }

    pub fn floor(&self, scope: SendScope) -> VirtualTime {
        match scope {
            SendScope::Local => self.local_min_delay,
            SendScope::Remote => self.min_delay,
        }
    }

    /// Check a requested delay against the floor for `scope`.
    ///
    /// On violation the error carries the floor, which is the delay the
    /// caller should use instead.
    pub fn check(
        &self,
        delay: VirtualTime,
        scope: SendScope,
    ) -> Result<VirtualTime, LookaheadViolation> {
        let floor = self.floor(scope);
        if delay < floor {
            return Err(LookaheadViolation {
                requested: delay,
                floor,
                scope,
            });
        }
        Ok(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_remote_zero_delay_violates_floor() {
        let lookahead = Lookahead::new(VirtualTime(5), VirtualTime(1));
        let err = lookahead
            .check(VirtualTime::ZERO, SendScope::Remote)
            .unwrap_err();
        assert_eq!(err.floor, VirtualTime(5));
        assert_eq!(err.to_string(), "remote delay 0 below lookahead floor 5");
    }

    #[test]
    fn test_local_floor_applies_to_local_sends() {
        let lookahead = Lookahead::new(VirtualTime(5), VirtualTime(1));
        assert_eq!(
            lookahead.check(VirtualTime(2), SendScope::Local),
            Ok(VirtualTime(2))
        );
        assert!(lookahead.check(VirtualTime(2), SendScope::Remote).is_err());
    }

    #[traced_test]
    #[test]
    fn test_inverted_floors_warn() {
        let lookahead = Lookahead::new(VirtualTime(1), VirtualTime(3));
        assert_eq!(lookahead.floor(SendScope::Local), VirtualTime(3));
        assert!(logs_contain(
            "Local lookahead exceeds cross-process lookahead"
        ));
    }
}
