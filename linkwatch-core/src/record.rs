//! Cycle records and their capped history

use chrono::{DateTime, Utc};

use crate::model::{CycleRecord, PingReading, PingSample, StatusSnapshot};
use crate::ring::RingBuffer;

impl CycleRecord {
    /// Combine the cycle's status snapshot with both samplers' latest readings
    pub fn build(
        timestamp: DateTime<Utc>,
        status: StatusSnapshot,
        router: Option<&PingSample>,
        target: Option<&PingSample>,
    ) -> Self {
        Self {
            timestamp,
            status,
            ping_target: PingReading::from(target),
            ping_router: PingReading::from(router),
        }
    }
}

/// Most recent cycle records, oldest evicted first
#[derive(Debug, Clone)]
pub struct RecordHistory {
    records: RingBuffer<CycleRecord>,
}

impl RecordHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            records: RingBuffer::new(cap),
        }
    }

    pub fn push(&mut self, record: CycleRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&CycleRecord> {
        self.records.latest()
    }

    /// Up to `n` records preceding the latest one, oldest first
    pub fn prior(&self, n: usize) -> Vec<CycleRecord> {
        let before_latest = self.records.len().saturating_sub(1);
        let skip = before_latest.saturating_sub(n);
        self.records
            .iter()
            .take(before_latest)
            .skip(skip)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CycleRecord> {
        self.records.iter()
    }
}
