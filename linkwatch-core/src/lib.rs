//! Linkwatch core - drop detection and evidence capture for a monitored link
//!
//! The engine this crate provides:
//! - Background ping samplers feeding bounded per-host histories
//! - Rotating retention slots for per-cycle screenshots and log snapshots
//! - A per-cycle drop detector (uptime reset, router ping, target ping)
//! - Evidence bundles written under `events/NNN/` for every drop
//! - A monitoring loop that ties it together and writes a summary on exit
//!
//! Everything that talks to the outside world (router pages, OS ping,
//! screenshots) is reached through the traits in [`ports`].

pub mod archive;
pub mod config;
pub mod detector;
pub mod error;
pub mod model;
pub mod monitor;
pub mod ports;
pub mod record;
pub mod report;
pub mod retention;
pub mod ring;
pub mod sampler;
pub mod uptime;

pub use archive::EvidenceArchiver;
pub use config::MonitorConfig;
pub use detector::{DropDetector, FailureStreak};
pub use error::MonitorError;
pub use model::{
    CycleRecord, DropEvent, DropReason, GenerationEvidence, HostRole, LogRow, PingReading,
    PingSample, PingWindow, ProbeOutcome, StatusSnapshot,
};
pub use monitor::{Collaborators, Monitor, MonitorPhase, MonitorState};
pub use ports::{LogSource, PageView, Prober, Screenshotter, StatusSource};
pub use record::RecordHistory;
pub use report::{MonitoredHosts, RunOutcome, SummaryReport};
pub use retention::{ArtifactKind, RetentionSlots};
pub use ring::{PingHistory, RingBuffer};
pub use sampler::PingSampler;
