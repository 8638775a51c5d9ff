//! Mapping entities to the LP that owns them.

use pdes_types::{EntityId, LpId};
use std::fmt;
use thiserror::Error;

/// Placement produced an LP that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Placement of {entity} returned {lp}, but only {num_lps} LPs exist")]
pub struct PlacementError {
    pub entity: EntityId,
    pub lp: LpId,
    pub num_lps: u32,
}

/// Decides which LP owns an entity.
///
/// # Guarantees
///
/// Implementations must be total and pure for a fixed entity population:
/// every LP in the run must get the same answer for the same entity, or
/// events will be delivered to a process that does not hold the entity.
pub trait Placement: Send + Sync {
    /// The LP that owns `entity`.
    fn find_owner(&self, entity: EntityId) -> LpId;

    /// Number of LPs in the run.
    fn num_lps(&self) -> u32;

    /// [`find_owner`](Self::find_owner) with a range check.
    fn owner_checked(&self, entity: EntityId) -> Result<LpId, PlacementError> {
        let lp = self.find_owner(entity);
        if lp.0 >= self.num_lps() {
            return Err(PlacementError {
                entity,
                lp,
                num_lps: self.num_lps(),
            });
        }
        Ok(lp)
    }
}

/// Round-robin placement by entity number.
#[derive(Debug, Clone, Copy)]
pub struct ModuloPlacement {
    num_lps: u32,
}

impl ModuloPlacement {
    pub fn new(num_lps: u32) -> Self {
        Self {
            num_lps: num_lps.max(1),
        }
    }
}

impl Placement for ModuloPlacement {
    fn find_owner(&self, entity: EntityId) -> LpId {
        LpId((entity.number % u64::from(self.num_lps)) as u32)
    }

    fn num_lps(&self) -> u32 {
        self.num_lps
    }
}

type Rule = Box<dyn Fn(EntityId) -> Option<LpId> + Send + Sync>;

/// Registered placement rules tried in order, falling back to
/// [`ModuloPlacement`] when none claims the entity.
pub struct PlacementChain {
    rules: Vec<Rule>,
    fallback: ModuloPlacement,
}

impl PlacementChain {
    pub fn new(num_lps: u32) -> Self {
        Self {
            rules: Vec::new(),
            fallback: ModuloPlacement::new(num_lps),
        }
    }

    /// Add a rule. Earlier rules win.
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(EntityId) -> Option<LpId> + Send + Sync + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    /// Place every entity of one kind on a fixed LP.
    pub fn with_kind_on(self, kind: char, lp: LpId) -> Self {
        self.with_rule(move |entity| (entity.kind == kind).then_some(lp))
    }
}

impl Placement for PlacementChain {
    fn find_owner(&self, entity: EntityId) -> LpId {
        self.rules
            .iter()
            .find_map(|rule| rule(entity))
            .unwrap_or_else(|| self.fallback.find_owner(entity))
    }

    fn num_lps(&self) -> u32 {
        self.fallback.num_lps
    }
}

impl fmt::Debug for PlacementChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacementChain")
            .field("rules", &self.rules.len())
            .field("num_lps", &self.fallback.num_lps)
            .finish()
    }
}
