//! Collaborator ports
//!
//! The engine never scrapes pages, spawns `ping` or renders screenshots
//! itself. It consumes these four traits; the agent binary provides the real
//! implementations and the devkit provides scripted ones.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::model::{LogRow, ProbeOutcome};

/// Router status page: one stable set of string keys, "" when unavailable
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self) -> Result<BTreeMap<String, String>>;
}

/// Router event log, in the order the device returns it
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn log_rows(&self, max_rows: Option<usize>) -> Result<Vec<LogRow>>;
}

/// Reachability probe for one host
///
/// An `Err` is treated exactly like an unreachable outcome by the sampler.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &str, count: u32, timeout: Duration) -> Result<ProbeOutcome>;
}

/// Page views captured every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageView {
    Status,
    Log,
}

/// Persists a capture of a page view to `dest`
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn capture(&self, view: PageView, dest: &Path) -> Result<()>;

    /// File extension of what `capture` writes
    fn extension(&self) -> &str {
        "png"
    }
}
