//! Final summary written on shutdown

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MonitorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Stopped by the cancellation signal
    Interrupted,
    /// Stopped by a fatal error, message included
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredHosts {
    pub target: String,
    pub router: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub generated_at: DateTime<Utc>,
    /// Cycle period in seconds
    pub check_period: f64,
    pub pings: MonitoredHosts,
    /// Drop events recorded during this run
    pub events: usize,
    pub cycles: u64,
    pub outcome: RunOutcome,
}

impl SummaryReport {
    pub async fn write(&self, path: &Path) -> Result<(), MonitorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
