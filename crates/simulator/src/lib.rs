//! PHOLD simulator
//!
//! A benchmark driver built on top of `pdes-simulation`.
//!
//! # Architecture
//!
//! The simulator builds on the kernel runners to provide:
//!
//! - **Workload**: the PHOLD model, a constant population of messages
//!   forwarded between random entities
//! - **Runner selection**: the same workload natively or on the cluster
//! - **Metrics**: kernel counters, events per second, and the forwarding
//!   delay distribution
//! - **Configuration**: TOML files, overridable from the command line
//!
//! # Example
//!
//! ```ignore
//! use pdes_simulator::{PholdConfig, RunMode, Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::default()
//!     .with_mode(RunMode::Cluster)
//!     .with_phold(PholdConfig::default().with_entities(64));
//!
//! let report = Simulator::new(config)?.run()?;
//! report.print();
//! ```

pub mod config;
pub mod metrics;
pub mod phold;
pub mod runner;

pub use config::{PholdConfig, RunMode, SimulatorConfig, SimulatorConfigError};
pub use metrics::{MetricsCollector, SimulationReport};
pub use phold::{PholdDelivery, PholdMessage, NODE_KIND, RECEIVER};
pub use runner::{Simulator, SimulatorError};
