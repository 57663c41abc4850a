//! Monitoring loop orchestrator
//!
//! RUNNING: every `cycle_period`
//! 1. rotate retention slots
//! 2. read both samplers' latest samples, update failure counters
//! 3. capture status, screenshots and log rows into generation 0
//! 4. build and append the cycle record
//! 5. evaluate the drop detector, archive evidence on a drop
//!
//! STOPPING: stop the samplers (bounded wait) and write `report.json`,
//! whether the loop ended on cancellation or on a fatal error.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::archive::{ArchiveInput, EvidenceArchiver};
use crate::config::MonitorConfig;
use crate::detector::DropDetector;
use crate::error::MonitorError;
use crate::model::{CycleRecord, DropEvent, HostRole, StatusSnapshot};
use crate::ports::{LogSource, PageView, Prober, Screenshotter, StatusSource};
use crate::record::RecordHistory;
use crate::report::{MonitoredHosts, RunOutcome, SummaryReport};
use crate::retention::{ArtifactKind, RetentionSlots};
use crate::ring::PingHistory;
use crate::sampler::{PingSampler, SamplerSettings};

/// External collaborators used once per cycle
#[derive(Clone)]
pub struct Collaborators {
    pub status: Arc<dyn StatusSource>,
    pub logs: Arc<dyn LogSource>,
    pub screens: Arc<dyn Screenshotter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Running,
    Stopping,
    Stopped,
}

/// Mutable state owned by the loop; only ever touched from its task
#[derive(Debug)]
pub struct MonitorState {
    pub detector: DropDetector,
    pub records: RecordHistory,
    pub events: Vec<DropEvent>,
    pub cycles: u64,
}

impl MonitorState {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            detector: DropDetector::new(config.failure_limit),
            records: RecordHistory::new(config.record_history_cap),
            events: Vec::new(),
            cycles: 0,
        }
    }
}

pub struct Monitor {
    config: MonitorConfig,
    collaborators: Collaborators,
    slots: RetentionSlots,
    archiver: EvidenceArchiver,
    router: PingHistory,
    target: PingHistory,
    state: MonitorState,
    phase: MonitorPhase,
}

impl Monitor {
    pub async fn new(config: MonitorConfig, collaborators: Collaborators) -> Result<Self, MonitorError> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.output_dir).await?;

        let slots = RetentionSlots::new(
            &config.output_dir,
            config.generations,
            collaborators.screens.extension(),
        );
        let archiver = EvidenceArchiver::open(config.events_dir(), config.ping_window).await?;
        let router = PingHistory::new(&config.router_host, config.ping_history_capacity);
        let target = PingHistory::new(&config.target_host, config.ping_history_capacity);
        let state = MonitorState::new(&config);

        Ok(Self {
            config,
            collaborators,
            slots,
            archiver,
            router,
            target,
            state,
            phase: MonitorPhase::Stopped,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn slots(&self) -> &RetentionSlots {
        &self.slots
    }

    /// History fed by the router sampler
    pub fn router_history(&self) -> &PingHistory {
        &self.router
    }

    /// History fed by the target sampler
    pub fn target_history(&self) -> &PingHistory {
        &self.target
    }

    /// Run until `cancel` fires or a cycle fails, then shut down cleanly
    ///
    /// The summary is written in both cases. A fatal error is returned after
    /// the summary has been flushed.
    pub async fn run(
        &mut self,
        prober: Arc<dyn Prober>,
        cancel: CancellationToken,
    ) -> Result<SummaryReport, MonitorError> {
        let sampler_cancel = cancel.child_token();
        let settings = SamplerSettings {
            interval: self.config.ping_interval,
            probe_count: self.config.probe_count,
            probe_timeout: self.config.probe_timeout,
        };
        let samplers = [
            PingSampler::spawn(
                HostRole::Router,
                self.router.clone(),
                prober.clone(),
                settings,
                sampler_cancel.clone(),
            ),
            PingSampler::spawn(
                HostRole::Target,
                self.target.clone(),
                prober,
                settings,
                sampler_cancel.clone(),
            ),
        ];

        self.phase = MonitorPhase::Running;
        info!(
            "monitoring {} (router) and {} (target) every {:?}",
            self.config.router_host, self.config.target_host, self.config.cycle_period
        );

        let result = self.run_loop(&cancel).await;

        self.phase = MonitorPhase::Stopping;
        match &result {
            Ok(()) => info!("stop requested, writing summary"),
            Err(e) => error!("monitoring stopped on error: {}", e),
        }

        sampler_cancel.cancel();
        for sampler in samplers {
            sampler.shutdown(self.config.shutdown_grace).await;
        }

        let outcome = match &result {
            Ok(()) => RunOutcome::Interrupted,
            Err(e) => RunOutcome::Failed(e.to_string()),
        };
        let report = self.summary(outcome);
        let report_path = self.config.report_path();
        let written = report.write(&report_path).await;
        self.phase = MonitorPhase::Stopped;

        match (result, written) {
            (Err(e), written) => {
                if let Err(write_err) = written {
                    error!("summary could not be written: {}", write_err);
                }
                Err(e)
            }
            (Ok(()), Err(write_err)) => Err(write_err),
            (Ok(()), Ok(())) => {
                info!(
                    "summary saved to {} ({} events)",
                    report_path.display(),
                    report.events
                );
                Ok(report)
            }
        }
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), MonitorError> {
        let mut ticker = tokio::time::interval(self.config.cycle_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            self.run_cycle().await?;
        }
    }

    pub async fn run_cycle(&mut self) -> Result<Option<DropEvent>, MonitorError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One full cycle stamped with `now`; returns the drop it produced, if any
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<Option<DropEvent>, MonitorError> {
        self.slots.rotate().await?;

        let router = self.router.latest();
        let target = self.target.latest();
        self.state
            .detector
            .observe_pings(router.as_ref(), target.as_ref());

        let status = self.capture(now).await?;
        let record = CycleRecord::build(now, status, router.as_ref(), target.as_ref());
        let uptime_seconds = record.status.uptime_seconds;
        self.state.records.push(record.clone());
        self.state.cycles += 1;

        let Some(reason) = self.state.detector.evaluate(uptime_seconds) else {
            return Ok(None);
        };

        let event = self
            .archiver
            .archive(ArchiveInput {
                reason,
                current: &record,
                history: &self.state.records,
                slots: &self.slots,
                router: &self.router,
                target: &self.target,
            })
            .await?;

        warn!(
            "DROP #{:03} at {} ({}), evidence saved to {}",
            event.index,
            event.detected_at.format("%F %T"),
            reason,
            event.directory.display()
        );
        self.state.events.push(event.clone());
        Ok(Some(event))
    }

    /// Capture this cycle's status and artifacts into generation 0
    async fn capture(&self, now: DateTime<Utc>) -> Result<StatusSnapshot, MonitorError> {
        let fields = self
            .collaborators
            .status
            .status()
            .await
            .map_err(|e| MonitorError::collaborator("status", e))?;
        let snapshot = StatusSnapshot::from_fields(now, fields);

        self.collaborators
            .screens
            .capture(
                PageView::Status,
                &self.slots.slot_path(ArtifactKind::StatusScreenshot, 0),
            )
            .await
            .map_err(|e| MonitorError::collaborator("status screenshot", e))?;

        let rows = self
            .collaborators
            .logs
            .log_rows(self.config.log_max_rows)
            .await
            .map_err(|e| MonitorError::collaborator("log", e))?;

        self.collaborators
            .screens
            .capture(
                PageView::Log,
                &self.slots.slot_path(ArtifactKind::LogScreenshot, 0),
            )
            .await
            .map_err(|e| MonitorError::collaborator("log screenshot", e))?;

        self.slots.write_log_rows(&rows).await?;
        Ok(snapshot)
    }

    pub fn summary(&self, outcome: RunOutcome) -> SummaryReport {
        SummaryReport {
            generated_at: Utc::now(),
            check_period: self.config.cycle_period.as_secs_f64(),
            pings: MonitoredHosts {
                target: self.config.target_host.clone(),
                router: self.config.router_host.clone(),
            },
            events: self.state.events.len(),
            cycles: self.state.cycles,
            outcome,
        }
    }
}
