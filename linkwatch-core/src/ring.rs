//! Bounded histories
//!
//! `RingBuffer` is a plain FIFO with a fixed capacity. `PingHistory` wraps
//! one behind a mutex so a sampler task can append while the main loop
//! reads: every append and every read happens under the lock, so a reader
//! never sees a half-written sample.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::model::PingSample;

/// Fixed-capacity FIFO; the oldest entry is evicted on overflow
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, returning the evicted entry if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }
}

/// Per-host sample history shared between its sampler and the main loop
#[derive(Debug, Clone)]
pub struct PingHistory {
    host: Arc<str>,
    inner: Arc<Mutex<RingBuffer<PingSample>>>,
}

impl PingHistory {
    pub fn new(host: impl Into<String>, capacity: usize) -> Self {
        let host: String = host.into();
        Self {
            host: Arc::from(host),
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity))),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn push(&self, sample: PingSample) {
        self.inner.lock().push(sample);
    }

    /// Most recent completed sample, if any
    pub fn latest(&self) -> Option<PingSample> {
        self.inner.lock().latest().copied()
    }

    /// Samples with `from <= sampled_at <= to`, oldest first
    pub fn window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<PingSample> {
        self.inner
            .lock()
            .iter()
            .filter(|s| s.sampled_at >= from && s.sampled_at <= to)
            .copied()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PingSample> {
        self.inner.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }
}
