//! Run report: kernel counters, wall-clock throughput, and the forwarding
//! delay distribution.

use crate::config::RunMode;
use crate::phold::PholdDelivery;
use hdrhistogram::Histogram;
use pdes_eventlist::EventListKind;
use pdes_simulation::SimulationStats;
use std::time::Duration;
use tracing::warn;

/// Collects per-process results into one [`SimulationReport`].
#[derive(Debug)]
pub struct MetricsCollector {
    delays: Histogram<u64>,
    received: u64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            delays: Histogram::new(3).unwrap_or_else(|_| unreachable!("sigfig 3 is in range")),
            received: 0,
        }
    }

    /// Fold one process's delivery into the totals.
    pub fn record(&mut self, delivery: &PholdDelivery) {
        self.received += delivery.received();
        if let Err(e) = self.delays.add(delivery.delays()) {
            warn!(error = ?e, "Failed to merge delay histogram");
        }
    }

    pub fn finish(
        self,
        mode: RunMode,
        processes: u32,
        event_list: EventListKind,
        stats: SimulationStats,
        wall_time: Duration,
    ) -> SimulationReport {
        SimulationReport {
            mode,
            processes,
            event_list,
            stats,
            received: self.received,
            wall_time,
            delays: self.delays,
        }
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct SimulationReport {
    pub mode: RunMode,
    pub processes: u32,
    pub event_list: EventListKind,
    pub stats: SimulationStats,
    /// Messages the PHOLD nodes received.
    pub received: u64,
    pub wall_time: Duration,
    pub delays: Histogram<u64>,
}

impl SimulationReport {
    /// Executed events per wall-clock second.
    pub fn events_per_second(&self) -> f64 {
        let secs = self.wall_time.as_secs_f64();
        if secs > 0.0 {
            self.stats.events_executed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn mean_delay(&self) -> f64 {
        self.delays.mean()
    }

    pub fn delay_at_quantile(&self, quantile: f64) -> u64 {
        self.delays.value_at_quantile(quantile)
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!();
        println!("=== PHOLD Run ===");
        println!("Mode:            {}", self.mode);
        println!("Processes:       {}", self.processes);
        if self.mode == RunMode::Native {
            println!("Event list:      {}", self.event_list);
        }
        println!("Wall time:       {:.2?}", self.wall_time);
        println!("Final time:      {}", self.stats.final_time);
        println!();
        println!("--- Events ---");
        println!("Executed:        {}", self.stats.events_executed);
        println!("Dropped:         {}", self.stats.events_dropped);
        println!("Unprocessed:     {}", self.stats.unprocessed);
        println!("Events/sec:      {:.0}", self.events_per_second());
        println!();
        println!("--- Sends ---");
        println!("Local:           {}", self.stats.local_sends);
        println!("Remote:          {}", self.stats.remote_sends);
        println!("Clamped:         {}", self.stats.clamped_sends);
        if self.mode == RunMode::Cluster {
            println!("Epochs:          {}", self.stats.epochs);
            println!("Late arrivals:   {}", self.stats.late_arrivals);
            println!("Decode errors:   {}", self.stats.decode_errors);
        }
        println!();
        println!("--- Forwarding Delay (ticks) ---");
        println!("Samples:         {}", self.delays.len());
        println!("Mean:            {:.2}", self.mean_delay());
        println!("P50:             {}", self.delay_at_quantile(0.50));
        println!("P90:             {}", self.delay_at_quantile(0.90));
        println!("P99:             {}", self.delay_at_quantile(0.99));
        println!("Max:             {}", self.delays.max());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PholdConfig;
    use pdes_types::VirtualTime;

    #[test]
    fn test_collector_merges_processes() {
        let config = PholdConfig::default();
        let mut a = PholdDelivery::new(&config, VirtualTime(1));
        let b = PholdDelivery::new(&config, VirtualTime(1));
        a.record_for_test(5);
        a.record_for_test(7);

        let mut collector = MetricsCollector::new();
        collector.record(&a);
        collector.record(&b);
        let report = collector.finish(
            RunMode::Cluster,
            2,
            EventListKind::default(),
            SimulationStats::default(),
            Duration::ZERO,
        );

        assert_eq!(report.delays.len(), 2);
        assert_eq!(report.delays.max(), 7);
        assert_eq!(report.events_per_second(), 0.0);
    }

    #[test]
    fn test_events_per_second() {
        let stats = SimulationStats {
            events_executed: 500,
            ..Default::default()
        };
        let report = MetricsCollector::new().finish(
            RunMode::Native,
            1,
            EventListKind::default(),
            stats,
            Duration::from_millis(250),
        );
        assert!((report.events_per_second() - 2_000.0).abs() < 1e-6);
    }
}
