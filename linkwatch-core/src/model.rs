//! Data model shared by the engine
//!
//! Every record here is immutable once built: samples are appended to
//! histories, cycle records to the record history, and drop events are
//! written once and never touched again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::uptime::parse_uptime;

/// Status key holding the connection uptime text
pub const UPTIME_KEY: &str = "uptime";

/// Opaque status fields reported next to the uptime
pub const FIELD_KEYS: [&str; 8] = [
    "iface_uptime",
    "cpu",
    "cpu_temp",
    "optical_power",
    "optical_temp",
    "mac",
    "ip",
    "fw_version",
];

/// Router status at one sampling instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub captured_at: DateTime<Utc>,
    /// Raw uptime text as shown by the device
    pub uptime: String,
    pub uptime_seconds: u64,
    /// Remaining fields, "" when the device did not report them
    pub fields: BTreeMap<String, String>,
}

impl StatusSnapshot {
    pub fn from_fields(captured_at: DateTime<Utc>, mut fields: BTreeMap<String, String>) -> Self {
        let uptime = fields.remove(UPTIME_KEY).unwrap_or_default();
        for key in FIELD_KEYS {
            fields.entry(key.to_string()).or_default();
        }

        Self {
            captured_at,
            uptime_seconds: parse_uptime(&uptime),
            uptime,
            fields,
        }
    }

    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }
}

/// One row of the router event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub number: String,
    pub datetime: String,
    pub event: String,
}

impl LogRow {
    pub fn new(
        number: impl Into<String>,
        datetime: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            datetime: datetime.into(),
            event: event.into(),
        }
    }
}

/// What a reachability collaborator reports for one probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub round_trip_ms: Option<f64>,
}

impl ProbeOutcome {
    pub fn up(round_trip_ms: Option<f64>) -> Self {
        Self {
            reachable: true,
            round_trip_ms,
        }
    }

    pub fn down() -> Self {
        Self {
            reachable: false,
            round_trip_ms: None,
        }
    }
}

/// One reachability sample taken by a background sampler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingSample {
    pub sampled_at: DateTime<Utc>,
    pub reachable: bool,
    pub round_trip_ms: Option<f64>,
}

impl PingSample {
    /// Normalise a probe outcome: unreachable samples carry no RTT and only
    /// positive, finite RTTs are kept.
    pub fn from_outcome(sampled_at: DateTime<Utc>, outcome: ProbeOutcome) -> Self {
        let round_trip_ms = if outcome.reachable {
            outcome
                .round_trip_ms
                .filter(|rtt| rtt.is_finite() && *rtt > 0.0)
        } else {
            None
        };

        Self {
            sampled_at,
            reachable: outcome.reachable,
            round_trip_ms,
        }
    }

    pub fn unreachable(sampled_at: DateTime<Utc>) -> Self {
        Self::from_outcome(sampled_at, ProbeOutcome::down())
    }
}

/// Latest sampler reading as stored in a cycle record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingReading {
    pub reachable: bool,
    pub rtt: Option<f64>,
    /// None until the sampler has produced its first sample
    pub sampled_at: Option<DateTime<Utc>>,
}

impl From<Option<&PingSample>> for PingReading {
    fn from(sample: Option<&PingSample>) -> Self {
        match sample {
            Some(s) => Self {
                reachable: s.reachable,
                rtt: s.round_trip_ms,
                sampled_at: Some(s.sampled_at),
            },
            None => Self {
                reachable: false,
                rtt: None,
                sampled_at: None,
            },
        }
    }
}

/// Everything observed in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub timestamp: DateTime<Utc>,
    pub status: StatusSnapshot,
    pub ping_target: PingReading,
    pub ping_router: PingReading,
}

/// The two monitored hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    Router,
    Target,
}

impl fmt::Display for HostRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostRole::Router => write!(f, "router"),
            HostRole::Target => write!(f, "target"),
        }
    }
}

/// Cause attached to a drop; exactly one per event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UptimeReset,
    RouterPing,
    TargetPing,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UptimeReset => write!(f, "uptime_reset"),
            DropReason::RouterPing => write!(f, "router_ping"),
            DropReason::TargetPing => write!(f, "target_ping"),
        }
    }
}

/// Artifacts of one retention generation, as copied into a bundle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationEvidence {
    /// Cycles ago the artifacts were captured; 0 is the triggering cycle
    pub generation: usize,
    pub status_screenshot: Option<PathBuf>,
    pub log_screenshot: Option<PathBuf>,
    pub log_rows: Option<Vec<LogRow>>,
}

impl GenerationEvidence {
    pub fn is_empty(&self) -> bool {
        self.status_screenshot.is_none() && self.log_screenshot.is_none() && self.log_rows.is_none()
    }
}

/// Ping samples around a detection, per host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingWindow {
    pub window_secs: u64,
    pub router: Vec<PingSample>,
    pub target: Vec<PingSample>,
}

/// A detected connectivity-loss incident and its evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    pub index: u32,
    pub detected_at: DateTime<Utc>,
    pub reason: DropReason,
    pub directory: PathBuf,
    pub prior_records: Vec<CycleRecord>,
    pub current: CycleRecord,
    pub before: Vec<GenerationEvidence>,
    pub after: GenerationEvidence,
    pub pings: PingWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_fills_missing_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("uptime".to_string(), "2 мин 5 сек".to_string());
        fields.insert("ip".to_string(), "10.0.0.2".to_string());

        let snapshot = StatusSnapshot::from_fields(Utc::now(), fields);
        assert_eq!(snapshot.uptime, "2 мин 5 сек");
        assert_eq!(snapshot.uptime_seconds, 125);
        assert_eq!(snapshot.field("ip"), "10.0.0.2");
        assert_eq!(snapshot.field("fw_version"), "");
        assert!(!snapshot.fields.contains_key("uptime"));
        assert_eq!(snapshot.fields.len(), FIELD_KEYS.len());
    }

    #[test]
    fn test_unreachable_sample_drops_rtt() {
        let outcome = ProbeOutcome {
            reachable: false,
            round_trip_ms: Some(12.0),
        };
        let sample = PingSample::from_outcome(Utc::now(), outcome);
        assert!(!sample.reachable);
        assert_eq!(sample.round_trip_ms, None);
    }

    #[test]
    fn test_non_positive_rtt_is_discarded() {
        let sample = PingSample::from_outcome(Utc::now(), ProbeOutcome::up(Some(0.0)));
        assert!(sample.reachable);
        assert_eq!(sample.round_trip_ms, None);

        let sample = PingSample::from_outcome(Utc::now(), ProbeOutcome::up(Some(f64::NAN)));
        assert_eq!(sample.round_trip_ms, None);
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&DropReason::UptimeReset).unwrap();
        assert_eq!(json, "\"uptime_reset\"");
        assert_eq!(DropReason::TargetPing.to_string(), "target_ping");
    }

    #[test]
    fn test_reading_without_sample() {
        let reading = PingReading::from(None);
        assert!(!reading.reachable);
        assert!(reading.sampled_at.is_none());
    }
}
