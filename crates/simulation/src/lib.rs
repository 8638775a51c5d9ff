//! Simulation runners for the PDES kernel.
//!
//! Two ways to drive the same model ([`Delivery`](pdes_core::Delivery)):
//!
//! - [`NativeRunner`]: every LP on one thread over one shared event list of
//!   the configured kind. Events execute in exact global timestamp order.
//! - [`ClusterRunner`]: one worker thread per process, each with one LP, a
//!   listener thread and a shared queue, synchronized in conservative
//!   epochs bounded by the lookahead.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     NativeRunner                        │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  NativeTransport (BinaryHeap | SplayTree | Ladder) │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  lps: Vec<LogicalProcess>  ──►  Delivery            │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ClusterRunner                       │
//! │   worker 0            worker 1            worker N-1    │
//! │   LP + queue  ◄─────► LP + queue  ◄─────► LP + queue    │
//! │   + listener   mesh   + listener   mesh   + listener    │
//! │        └───────── barrier / min-reduce ─────────┘       │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod cluster;
mod config;
mod error;
mod native;
mod stats;

pub use cluster::{ClusterReport, ClusterRunner};
pub use config::{ConfigError, SimulationConfig};
pub use error::SimulationError;
pub use native::NativeRunner;
pub use stats::SimulationStats;
