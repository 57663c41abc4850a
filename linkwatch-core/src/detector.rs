//! Drop detector
//!
//! Evaluated once per cycle. Three conditions, first match wins:
//! 1. `uptime_reset`: parsed uptime went down since the previous cycle
//! 2. `router_ping`: router failure streak reached the limit this cycle
//! 3. `target_ping`: same for the uplink target
//!
//! Streaks fire on equality with the limit, never on "at least", so one
//! outage yields one event. After any event both counters go back to 0 and
//! every host that was mid-streak stays latched until its next success.

use tracing::debug;

use crate::model::{DropReason, PingSample};

/// Consecutive-failure counter for one host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureStreak {
    count: u32,
    latched: bool,
}

impl FailureStreak {
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Fold in the latest sample: success clears and re-arms, failure counts
    pub fn observe(&mut self, reachable: bool) {
        if reachable {
            self.count = 0;
            self.latched = false;
        } else {
            self.count = self.count.saturating_add(1);
        }
    }

    fn tripped(&self, limit: u32) -> bool {
        !self.latched && self.count == limit
    }

    fn reset_after_event(&mut self) {
        if self.count > 0 {
            self.latched = true;
        }
        self.count = 0;
    }
}

#[derive(Debug, Clone)]
pub struct DropDetector {
    failure_limit: u32,
    previous_uptime: Option<u64>,
    router: FailureStreak,
    target: FailureStreak,
}

impl DropDetector {
    pub fn new(failure_limit: u32) -> Self {
        Self {
            failure_limit,
            previous_uptime: None,
            router: FailureStreak::default(),
            target: FailureStreak::default(),
        }
    }

    pub fn router_streak(&self) -> FailureStreak {
        self.router
    }

    pub fn target_streak(&self) -> FailureStreak {
        self.target
    }

    pub fn previous_uptime(&self) -> Option<u64> {
        self.previous_uptime
    }

    /// Update both counters from the samplers' latest samples
    ///
    /// A sampler that has not produced anything yet leaves its counter alone.
    pub fn observe_pings(&mut self, router: Option<&PingSample>, target: Option<&PingSample>) {
        if let Some(sample) = router {
            self.router.observe(sample.reachable);
        }
        if let Some(sample) = target {
            self.target.observe(sample.reachable);
        }
    }

    /// Decide this cycle's drop, if any, and remember `uptime_seconds`
    pub fn evaluate(&mut self, uptime_seconds: u64) -> Option<DropReason> {
        let reason = if self
            .previous_uptime
            .is_some_and(|previous| uptime_seconds < previous)
        {
            Some(DropReason::UptimeReset)
        } else if self.router.tripped(self.failure_limit) {
            Some(DropReason::RouterPing)
        } else if self.target.tripped(self.failure_limit) {
            Some(DropReason::TargetPing)
        } else {
            None
        };

        self.previous_uptime = Some(uptime_seconds);

        if let Some(reason) = reason {
            debug!(
                "drop {} (router streak {}, target streak {})",
                reason,
                self.router.count(),
                self.target.count()
            );
            self.router.reset_after_event();
            self.target.reset_after_event();
        }

        reason
    }
}
