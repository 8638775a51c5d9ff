//! Structural errors for event lists.

use crate::event::{EventHandle, ListId};
use thiserror::Error;
use tracing::error;

/// A broken event-list invariant.
///
/// These are programmer errors. Continuing after one risks executing events
/// out of time order, so the panicking list operations log the error and abort
/// the worker. The `try_*` operations surface them instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("event is already scheduled as {0}")]
    AlreadyScheduled(EventHandle),

    #[error("handle {handle} belongs to another list than {list}")]
    ForeignHandle { handle: EventHandle, list: ListId },

    #[error("handle {0} does not name a scheduled event")]
    StaleHandle(EventHandle),

    #[error("timestamp {0} cannot be ordered")]
    InvalidTimestamp(String),

    #[error("bucket index {index} out of range for rung {rung} with {count} buckets")]
    BucketOutOfRange {
        rung: usize,
        index: i64,
        count: usize,
    },

    #[error("ladder depth exceeded: rung {0} requested")]
    RungOverflow(usize),
}

/// Log a structural violation and abort.
#[track_caller]
pub(crate) fn fatal(err: StructuralError) -> ! {
    error!(error = %err, "Event list structural violation");
    panic!("{err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_fatal_logs_before_panicking() {
        let result = panic::catch_unwind(|| fatal(StructuralError::RungOverflow(9)));
        assert!(result.is_err());
        assert!(logs_contain("Event list structural violation"));
        assert!(logs_contain("rung 9 requested"));
    }
}
