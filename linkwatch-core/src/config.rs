//! Engine configuration
//!
//! Plain values with sane defaults. The agent binary fills this from its
//! TOML file and environment; tests build it directly.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MonitorError;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Root for retention slots, `events/` and `report.json`
    pub output_dir: PathBuf,
    /// Period of the main evaluation loop
    pub cycle_period: Duration,
    /// K: number of prior generations kept in retention slots
    pub generations: usize,
    /// Sleep between two probes of the same host
    pub ping_interval: Duration,
    pub probe_count: u32,
    pub probe_timeout: Duration,
    /// Consecutive failures that raise a ping drop
    pub failure_limit: u32,
    /// W: ping context kept in evidence bundles, counted back from detection
    pub ping_window: Duration,
    pub record_history_cap: usize,
    pub ping_history_capacity: usize,
    pub log_max_rows: Option<usize>,
    /// Bounded wait for samplers on shutdown
    pub shutdown_grace: Duration,
    /// Uplink host probed beyond the router
    pub target_host: String,
    pub router_host: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("router_monitor"),
            cycle_period: Duration::from_secs(5),
            generations: 2,
            ping_interval: Duration::from_secs(1),
            probe_count: 1,
            probe_timeout: Duration::from_secs(1),
            failure_limit: 3,
            ping_window: Duration::from_secs(120),
            record_history_cap: 100,
            ping_history_capacity: 300,
            log_max_rows: None,
            shutdown_grace: Duration::from_secs(2),
            target_host: "77.88.8.8".to_string(),
            router_host: "192.168.2.1".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.generations == 0 {
            return Err(MonitorError::InvalidConfig(
                "generations must be at least 1".into(),
            ));
        }
        if self.failure_limit == 0 {
            return Err(MonitorError::InvalidConfig(
                "failure_limit must be at least 1".into(),
            ));
        }
        if self.cycle_period.is_zero() || self.ping_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "cycle_period and ping_interval must be non-zero".into(),
            ));
        }
        if self.record_history_cap == 0 || self.ping_history_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "history capacities must be at least 1".into(),
            ));
        }
        if self.probe_count == 0 {
            return Err(MonitorError::InvalidConfig(
                "probe_count must be at least 1".into(),
            ));
        }
        if self.target_host.trim().is_empty() || self.router_host.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "target_host and router_host must be set".into(),
            ));
        }
        Ok(())
    }

    pub fn events_dir(&self) -> PathBuf {
        self.output_dir.join("events")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("report.json")
    }
}
