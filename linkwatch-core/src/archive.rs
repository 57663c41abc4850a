//! Evidence archiver
//!
//! Turns a detected drop into a self-contained bundle under
//! `events/NNN/`:
//! - `event.json` with the whole `DropEvent`
//! - `status_before.json` with the last record before the drop, if any
//! - `status_before_<g>.*`, `log_before_<g>.*` for each kept generation g
//! - `status_after.*`, `log_after.*` from the triggering cycle
//!
//! Bundles are append-only. Indexes continue after the highest directory
//! already present, so a restart never reuses one.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::model::{CycleRecord, DropEvent, DropReason, GenerationEvidence, PingWindow};
use crate::record::RecordHistory;
use crate::retention::{ArtifactKind, RetentionSlots};
use crate::ring::PingHistory;

/// Everything the archiver reads for one drop
pub struct ArchiveInput<'a> {
    pub reason: DropReason,
    pub current: &'a CycleRecord,
    pub history: &'a RecordHistory,
    pub slots: &'a RetentionSlots,
    pub router: &'a PingHistory,
    pub target: &'a PingHistory,
}

#[derive(Debug)]
pub struct EvidenceArchiver {
    events_dir: PathBuf,
    next_index: u32,
    ping_window: Duration,
}

impl EvidenceArchiver {
    /// Prepare `events_dir` and pick the next free index
    pub async fn open(events_dir: impl Into<PathBuf>, ping_window: Duration) -> Result<Self, MonitorError> {
        let events_dir = events_dir.into();
        tokio::fs::create_dir_all(&events_dir).await?;
        let next_index = next_free_index(&events_dir).await?;
        debug!(
            "evidence archiver ready at {} (next index {:03})",
            events_dir.display(),
            next_index
        );

        Ok(Self {
            events_dir,
            next_index,
            ping_window,
        })
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn events_dir(&self) -> &Path {
        &self.events_dir
    }

    /// Build and persist the bundle for one drop
    pub async fn archive(&mut self, input: ArchiveInput<'_>) -> Result<DropEvent, MonitorError> {
        let (index, directory) = self.claim_directory().await?;
        let detected_at = input.current.timestamp;
        let ext = input.slots.screenshot_ext().to_string();

        let mut before = Vec::new();
        for generation in 1..=input.slots.generations() {
            let evidence = collect_generation(
                input.slots,
                generation,
                &directory.join(format!("status_before_{generation}.{ext}")),
                &directory.join(format!("log_before_{generation}.{ext}")),
            )
            .await;
            if !evidence.is_empty() {
                before.push(evidence);
            }
        }

        let after = collect_generation(
            input.slots,
            0,
            &directory.join(format!("status_after.{ext}")),
            &directory.join(format!("log_after.{ext}")),
        )
        .await;

        let from = window_start(detected_at, self.ping_window);
        let pings = PingWindow {
            window_secs: self.ping_window.as_secs(),
            router: input.router.window(from, detected_at),
            target: input.target.window(from, detected_at),
        };

        let prior_records = input.history.prior(input.slots.generations());
        if let Some(previous) = prior_records.last() {
            let json = serde_json::to_vec_pretty(previous)?;
            tokio::fs::write(directory.join("status_before.json"), json).await?;
        }

        let event = DropEvent {
            index,
            detected_at,
            reason: input.reason,
            directory: directory.clone(),
            prior_records,
            current: input.current.clone(),
            before,
            after,
            pings,
        };

        let json = serde_json::to_vec_pretty(&event)?;
        tokio::fs::write(directory.join("event.json"), json).await?;

        Ok(event)
    }

    /// Create the next `NNN` directory, skipping any that already exist
    async fn claim_directory(&mut self) -> Result<(u32, PathBuf), MonitorError> {
        loop {
            let index = self.next_index;
            self.next_index += 1;
            let dir = self.events_dir.join(format!("{index:03}"));
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok((index, dir)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn next_free_index(events_dir: &Path) -> Result<u32, MonitorError> {
    let mut entries = tokio::fs::read_dir(events_dir).await?;
    let mut next = 0u32;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(index) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        {
            next = next.max(index.saturating_add(1));
        }
    }
    Ok(next)
}

fn window_start(detected_at: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| detected_at.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Copy one generation's artifacts; anything missing is left out
async fn collect_generation(
    slots: &RetentionSlots,
    generation: usize,
    status_dest: &Path,
    log_dest: &Path,
) -> GenerationEvidence {
    let status_screenshot =
        copy_artifact(&slots.slot_path(ArtifactKind::StatusScreenshot, generation), status_dest).await;
    let log_screenshot =
        copy_artifact(&slots.slot_path(ArtifactKind::LogScreenshot, generation), log_dest).await;
    let log_rows = match slots.read_log_rows(generation).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("log rows of generation {} unreadable: {}", generation, e);
            None
        }
    };

    GenerationEvidence {
        generation,
        status_screenshot,
        log_screenshot,
        log_rows,
    }
}

async fn copy_artifact(src: &Path, dest: &Path) -> Option<PathBuf> {
    match tokio::fs::copy(src, dest).await {
        Ok(_) => Some(dest.to_path_buf()),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("could not copy {} into bundle: {}", src.display(), e);
            None
        }
    }
}
