//! Core types shared by every PDES crate.
//!
//! - [`Timestamp`]: the ordering contract event lists are generic over, with
//!   the bucket arithmetic the ladder queue needs.
//! - [`VirtualTime`]: integer simulation ticks used by logical processes.
//! - Identifiers: [`EntityId`], [`ServiceAddress`], [`LpId`].

mod identifiers;
mod time;

pub use identifiers::{EntityId, LpId, ServiceAddress};
pub use time::{Timestamp, VirtualTime};
