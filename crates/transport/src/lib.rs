//! Cross-process transport for the PDES kernel.
//!
//! Each process runs a main loop and a listener thread that share one
//! mutex-protected [`EventQueue`](pdes_core::EventQueue):
//!
//! ```text
//!  process A                                   process B
//! ┌───────────────────────────┐              ┌───────────────────────────┐
//! │ main loop                 │   frames     │ listener thread           │
//! │  LP ─► ProcessTransport ──┼─────────────►│  decode ─► SharedQueue    │
//! │         │ local           │              │                 ▲         │
//! │         ▼                 │              │ main loop ──pop─┘         │
//! │     SharedQueue ◄─ listener thread       │                           │
//! └───────────────────────────┘              └───────────────────────────┘
//!              │                                           │
//!              └────── barrier / in-flight / min-reduce ───┘
//! ```
//!
//! Frames are `[u32 BE length][body]`; see [`codec`] for the body layout.

pub mod codec;
mod error;
mod frame;
mod in_flight;
mod listener;
mod mesh;
mod process;
mod reducer;

pub use codec::CodecError;
pub use error::TransportError;
pub use frame::{ChannelReader, Frame, StreamFrameSource};
pub use in_flight::InFlight;
pub use listener::{Listener, ListenerStats};
pub use mesh::{mesh, Endpoint, Inbox, Outbox};
pub use process::{shared_queue, ProcessTransport, ProcessTransportStats, SharedClock, SharedQueue};
pub use reducer::{LocalReducer, MinReducer};
