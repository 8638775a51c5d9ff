//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated entity identifier: a kind tag plus a number within that kind.
///
/// Placement and delivery key on the full pair, so `('n', 3)` and `('h', 3)`
/// are distinct entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    /// Entity kind tag.
    pub kind: char,
    /// Number within the kind.
    pub number: u64,
}

impl EntityId {
    /// Create an entity id.
    pub const fn new(kind: char, number: u64) -> Self {
        Self { kind, number }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.kind, self.number)
    }
}

/// Address of a service installed on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceAddress(pub u32);

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service({})", self.0)
    }
}

/// Logical process identifier.
///
/// LPs are numbered densely from zero, one per worker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LpId(pub u32);

impl LpId {
    /// Position of this LP in per-LP vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LP({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_identity_includes_kind() {
        assert_ne!(EntityId::new('n', 3), EntityId::new('h', 3));
        assert_eq!(EntityId::new('n', 3).to_string(), "(n, 3)");
    }

    #[test]
    fn test_lp_index() {
        assert_eq!(LpId(4).index(), 4);
        assert_eq!(LpId(4).to_string(), "LP(4)");
    }
}
