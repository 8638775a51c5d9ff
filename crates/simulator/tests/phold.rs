//! End-to-end PHOLD runs driven from configuration files.

use pdes_simulator::{RunMode, Simulator, SimulatorConfig};
use std::io::Write;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_cluster_run_from_file() {
    let file = write_config(
        r#"
        mode = "cluster"

        [simulation]
        min_delay = 1
        end_time = 200
        processes = 3
        seed = 99

        [phold]
        entities = 12
        events_per_entity = 1
        mean_delay = 2.0
        "#,
    );

    let config = SimulatorConfig::load(file.path()).unwrap();
    assert_eq!(config.mode, RunMode::Cluster);

    let report = Simulator::new(config).unwrap().run().unwrap();
    assert_eq!(report.processes, 3);
    assert_eq!(report.stats.unprocessed, 12);
    assert_eq!(report.stats.events_dropped, 0);
    assert!(report.stats.events_executed >= 12);
    assert!(report.delays.min() >= 1);
}

#[test]
fn test_dumped_config_parses_back() {
    let config = SimulatorConfig::default().with_mode(RunMode::Cluster);
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: SimulatorConfig = text.parse().unwrap();
    assert_eq!(parsed, config);
}
