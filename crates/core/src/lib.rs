//! Core kernel types for conservative parallel discrete-event simulation.
//!
//! A [`LogicalProcess`] owns a clock and a random stream and turns send
//! requests into time-stamped envelopes ([`EventInfo`]), enforcing the
//! [`Lookahead`] floors. Where envelopes are stored is the business of a
//! [`Transport`]; who executes them is the business of a [`Delivery`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ runner (native or cluster)                                 │
//! │   pops the earliest envelope, advances the LP, delivers    │
//! └──────────────┬─────────────────────────────▲───────────────┘
//!                │ SimContext { lp, transport } │ pop
//!                ▼                              │
//! ┌───────────────────────┐  send   ┌──────────┴─────────────┐
//! │ Delivery (the model)  │ ──────► │ LogicalProcess         │
//! └───────────────────────┘         │  placement + lookahead │
//!                                   └──────────┬─────────────┘
//!                                              │ dispatch(dest, envelope)
//!                                              ▼
//!                          NativeTransport (event list) or
//!                          cross-process transport (EventQueue + wire)
//! ```

mod delivery;
mod envelope;
mod event_queue;
mod lookahead;
mod lp;
mod phase;
mod placement;
mod transport;

pub use delivery::{deliver_logged, Delivery, DeliveryError, SimContext};
pub use envelope::{require, EventInfo, Payload, PayloadError};
pub use event_queue::EventQueue;
pub use lookahead::{Lookahead, LookaheadViolation, SendScope};
pub use lp::{LogicalProcess, LpStats};
pub use phase::{Phase, PhaseError, PhaseGate};
pub use placement::{ModuloPlacement, Placement, PlacementChain, PlacementError};
pub use transport::{NativeTransport, Routed, Transport};

pub use pdes_eventlist::{EventHandle, EventListKind};
pub use pdes_types::{EntityId, LpId, ServiceAddress, VirtualTime};
