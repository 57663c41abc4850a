//! Cycle-by-cycle harness around a `Monitor`
//!
//! Drives `run_cycle_at` on a manual clock so drop scenarios can be
//! replayed deterministically, with ping samples injected straight into
//! the histories instead of coming from live samplers.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use linkwatch_core::{
    ArtifactKind, Collaborators, DropEvent, HostRole, Monitor, MonitorConfig, PingSample,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::scripted::ScriptedRouter;

pub struct MonitorHarness {
    pub monitor: Monitor,
    pub router: ScriptedRouter,
    clock: DateTime<Utc>,
    _temp_dir: TempDir,
}

impl MonitorHarness {
    /// Fresh monitor in a temp dir; `configure` tweaks the defaults
    pub async fn new(configure: impl FnOnce(&mut MonitorConfig)) -> Result<Self> {
        let _ = env_logger::try_init();

        let temp_dir = TempDir::new()?;
        let mut config = MonitorConfig {
            output_dir: temp_dir.path().join("router_monitor"),
            ..MonitorConfig::default()
        };
        configure(&mut config);

        let router = ScriptedRouter::new();
        let collaborators = Collaborators {
            status: Arc::new(router.clone()),
            logs: Arc::new(router.clone()),
            screens: Arc::new(router.clone()),
        };
        let monitor = Monitor::new(config, collaborators).await?;
        log::info!("harness ready in {}", temp_dir.path().display());

        Ok(Self {
            monitor,
            router,
            // 2024-01-01 12:00:00 UTC
            clock: DateTime::from_timestamp(1_704_110_400, 0).unwrap_or_default(),
            _temp_dir: temp_dir,
        })
    }

    /// Timestamp the next cycle will carry
    pub fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    pub fn output_dir(&self) -> PathBuf {
        self.monitor.config().output_dir.clone()
    }

    /// Append a sample stamped just before the next cycle
    pub fn push_ping(&self, role: HostRole, reachable: bool) {
        self.push_ping_at(role, reachable, self.clock - ChronoDuration::milliseconds(500));
    }

    pub fn push_ping_at(&self, role: HostRole, reachable: bool, at: DateTime<Utc>) {
        let sample = if reachable {
            PingSample {
                sampled_at: at,
                reachable: true,
                round_trip_ms: Some(12.5),
            }
        } else {
            PingSample::unreachable(at)
        };
        match role {
            HostRole::Router => self.monitor.router_history().push(sample),
            HostRole::Target => self.monitor.target_history().push(sample),
        }
    }

    /// Run one cycle reporting `uptime`, then advance the clock
    pub async fn cycle(&mut self, uptime: &str) -> Result<Option<DropEvent>> {
        self.router.push_uptime(uptime);
        let at = self.clock;
        let event = self.monitor.run_cycle_at(at).await?;
        self.clock = at + chrono_period(self.monitor.config().cycle_period);
        Ok(event)
    }

    pub fn events(&self) -> &[DropEvent] {
        &self.monitor.state().events
    }

    /// Decoded `event.json` of bundle `index`
    pub fn read_event(&self, index: u32) -> Result<serde_json::Value> {
        let path = self
            .monitor
            .config()
            .events_dir()
            .join(format!("{index:03}"))
            .join("event.json");
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }

    /// Contents of a retention slot, `None` when the slot is empty
    pub fn read_slot(&self, kind: ArtifactKind, generation: usize) -> Option<String> {
        std::fs::read_to_string(self.monitor.slots().slot_path(kind, generation)).ok()
    }
}

fn chrono_period(period: Duration) -> ChronoDuration {
    ChronoDuration::from_std(period).unwrap_or_else(|_| ChronoDuration::seconds(5))
}
