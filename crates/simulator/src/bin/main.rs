//! PDES simulator CLI
//!
//! Runs the PHOLD benchmark on the native or cluster runner.

use anyhow::Context;
use clap::Parser;
use pdes_eventlist::EventListKind;
use pdes_simulator::{RunMode, Simulator, SimulatorConfig};
use pdes_types::VirtualTime;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdes-sim")]
#[command(about = "PHOLD benchmark for the PDES kernel")]
#[command(version)]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Runner (native, cluster)
    #[arg(long)]
    mode: Option<RunMode>,

    /// Event list for the native runner (binary_heap, splay_tree, ladder_queue)
    #[arg(long)]
    event_list: Option<EventListKind>,

    /// LPs (native) or worker threads (cluster)
    #[arg(short, long)]
    processes: Option<u32>,

    /// Last simulated time at which events execute
    #[arg(long)]
    end_time: Option<u64>,

    /// Cross-process lookahead
    #[arg(long)]
    min_delay: Option<u64>,

    /// Floor on delays between entities of the same process
    #[arg(long)]
    local_min_delay: Option<u64>,

    /// Number of PHOLD entities
    #[arg(long)]
    entities: Option<u64>,

    /// Initial messages per entity
    #[arg(long)]
    events_per_entity: Option<u32>,

    /// Mean of the exponential forwarding delay
    #[arg(long)]
    mean_delay: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

impl Cli {
    fn resolve(&self) -> anyhow::Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulatorConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        let sim = &mut config.simulation;
        if let Some(kind) = self.event_list {
            sim.event_list = kind;
        }
        if let Some(processes) = self.processes {
            sim.processes = processes;
        }
        if let Some(end) = self.end_time {
            sim.end_time = VirtualTime(end);
        }
        if let Some(min_delay) = self.min_delay {
            sim.min_delay = VirtualTime(min_delay);
        }
        if let Some(local) = self.local_min_delay {
            sim.local_min_delay = VirtualTime(local);
        }
        if let Some(seed) = self.seed {
            sim.seed = seed;
        }
        let phold = &mut config.phold;
        if let Some(entities) = self.entities {
            phold.entities = entities;
        }
        if let Some(events) = self.events_per_entity {
            phold.events_per_entity = events;
        }
        if let Some(mean) = self.mean_delay {
            phold.mean_delay = mean;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    if cli.dump_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let simulator = Simulator::new(config)?;
    let report = simulator.run()?;
    report.print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_flags_override_defaults() {
        let cli = Cli::parse_from(["pdes-sim", "--min-delay", "4", "--local-min-delay", "2"]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.simulation.min_delay, VirtualTime(4));
        assert_eq!(config.simulation.local_min_delay, VirtualTime(2));
    }

    #[test]
    fn test_unset_flags_keep_defaults() {
        let config = Cli::parse_from(["pdes-sim"]).resolve().unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }
}
