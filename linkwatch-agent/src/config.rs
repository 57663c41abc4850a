//! Agent configuration
//!
//! Handles:
//! - TOML file (`LINKWATCH_CONFIG`, else the OS config dir, else defaults)
//! - Human-readable durations (`"5s"`, `"2m"`)
//! - Environment overrides for the common knobs
//! - Conversion into the engine's `MonitorConfig`

use anyhow::{Context, Result};
use linkwatch_core::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub monitor: MonitorSection,
    pub router: RouterSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub output_dir: PathBuf,
    pub cycle_period: String,
    pub generations: usize,
    pub ping_interval: String,
    pub probe_count: u32,
    pub probe_timeout: String,
    pub failure_limit: u32,
    pub ping_window: String,
    pub record_history_cap: usize,
    pub ping_history_capacity: usize,
    pub log_max_rows: Option<usize>,
    pub shutdown_grace: String,
    pub target_host: String,
    pub router_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    pub base_url: String,
    pub status_path: String,
    pub log_path: String,
    pub request_timeout: String,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let engine = MonitorConfig::default();
        Self {
            output_dir: engine.output_dir,
            cycle_period: "5s".to_string(),
            generations: engine.generations,
            ping_interval: "1s".to_string(),
            probe_count: engine.probe_count,
            probe_timeout: "1s".to_string(),
            failure_limit: engine.failure_limit,
            ping_window: "2m".to_string(),
            record_history_cap: engine.record_history_cap,
            ping_history_capacity: engine.ping_history_capacity,
            log_max_rows: engine.log_max_rows,
            shutdown_grace: "2s".to_string(),
            target_host: engine.target_host,
            router_host: engine.router_host,
        }
    }
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.2.1".to_string(),
            status_path: "/status/st_deviceinfo_tl.htm".to_string(),
            log_path: "/status/st_log_tl.htm".to_string(),
            request_timeout: "10s".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load the config file if there is one, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let path = match std::env::var("LINKWATCH_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => Self::config_file_path().ok(),
        };

        let mut config = match path {
            Some(path) if path.exists() => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml(&content)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?
            }
            _ => {
                debug!("No configuration file, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(content)?)
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("linkwatch");
        path.push("config.toml");
        Ok(path)
    }

    /// Override selected values from `lookup` (the process environment in prod)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("LINKWATCH_OUTPUT_DIR") {
            self.monitor.output_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("LINKWATCH_TARGET") {
            self.monitor.target_host = host;
        }
        if let Some(host) = lookup("LINKWATCH_ROUTER") {
            self.monitor.router_host = host;
        }
        if let Some(period) = lookup("LINKWATCH_CYCLE_PERIOD") {
            self.monitor.cycle_period = period;
        }
        if let Some(k) = lookup("LINKWATCH_GENERATIONS") {
            self.monitor.generations = k
                .parse()
                .context("LINKWATCH_GENERATIONS must be a positive integer")?;
        }
        if let Some(limit) = lookup("LINKWATCH_FAILURE_LIMIT") {
            self.monitor.failure_limit = limit
                .parse()
                .context("LINKWATCH_FAILURE_LIMIT must be a positive integer")?;
        }
        if let Some(url) = lookup("LINKWATCH_ROUTER_URL") {
            self.router.base_url = url;
        }
        Ok(())
    }

    /// Engine settings with durations parsed and values validated
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        let m = &self.monitor;
        let config = MonitorConfig {
            output_dir: m.output_dir.clone(),
            cycle_period: parse_duration("cycle_period", &m.cycle_period)?,
            generations: m.generations,
            ping_interval: parse_duration("ping_interval", &m.ping_interval)?,
            probe_count: m.probe_count,
            probe_timeout: parse_duration("probe_timeout", &m.probe_timeout)?,
            failure_limit: m.failure_limit,
            ping_window: parse_duration("ping_window", &m.ping_window)?,
            record_history_cap: m.record_history_cap,
            ping_history_capacity: m.ping_history_capacity,
            log_max_rows: m.log_max_rows,
            shutdown_grace: parse_duration("shutdown_grace", &m.shutdown_grace)?,
            target_host: m.target_host.clone(),
            router_host: m.router_host.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration("request_timeout", &self.router.request_timeout)
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .with_context(|| format!("{name}: invalid duration {value:?}"))
}
