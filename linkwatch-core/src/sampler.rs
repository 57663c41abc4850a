//! Background ping samplers
//!
//! One task per monitored host. Each probes on its own interval, appends to
//! its `PingHistory` and never waits on the main loop. A probe that errors,
//! times out or returns garbage is just an unreachable sample.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{HostRole, PingSample};
use crate::ports::Prober;
use crate::ring::PingHistory;

/// Slack on top of the collaborator's own timeout before we give up on it
const PROBE_GUARD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct SamplerSettings {
    pub interval: Duration,
    pub probe_count: u32,
    pub probe_timeout: Duration,
}

/// Handle on a running sampler task
pub struct PingSampler {
    role: HostRole,
    history: PingHistory,
    handle: Option<JoinHandle<()>>,
}

impl PingSampler {
    /// Start sampling `history.host()` until `cancel` fires
    pub fn spawn(
        role: HostRole,
        history: PingHistory,
        prober: Arc<dyn Prober>,
        settings: SamplerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(sampling_loop(
            role,
            history.clone(),
            prober,
            settings,
            cancel,
        ));

        Self {
            role,
            history,
            handle: Some(handle),
        }
    }

    pub fn role(&self) -> HostRole {
        self.role
    }

    pub fn history(&self) -> &PingHistory {
        &self.history
    }

    /// Wait at most `grace` for the task to notice cancellation, then abort it
    pub async fn shutdown(mut self, grace: Duration) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => debug!("{} sampler joined", self.role),
            Ok(Err(e)) => warn!("{} sampler task failed: {}", self.role, e),
            Err(_) => {
                warn!(
                    "{} sampler did not stop within {:?}, aborting",
                    self.role, grace
                );
                handle.abort();
            }
        }
    }
}

async fn sampling_loop(
    role: HostRole,
    history: PingHistory,
    prober: Arc<dyn Prober>,
    settings: SamplerSettings,
    cancel: CancellationToken,
) {
    info!(
        "{} sampler started for {} (every {:?})",
        role,
        history.host(),
        settings.interval
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let sample = sample_once(prober.as_ref(), history.host(), &settings).await;
        history.push(sample);

        tokio::select! {
            _ = tokio::time::sleep(settings.interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    info!("{} sampler for {} shutting down", role, history.host());
}

/// Run one probe and turn whatever happens into a sample
pub async fn sample_once(prober: &dyn Prober, host: &str, settings: &SamplerSettings) -> PingSample {
    let guard = settings.probe_timeout * settings.probe_count.max(1) + PROBE_GUARD;
    let result = tokio::time::timeout(
        guard,
        prober.probe(host, settings.probe_count, settings.probe_timeout),
    )
    .await;

    let sampled_at = Utc::now();
    match result {
        Ok(Ok(outcome)) => PingSample::from_outcome(sampled_at, outcome),
        Ok(Err(e)) => {
            debug!("probe of {} failed: {:#}", host, e);
            PingSample::unreachable(sampled_at)
        }
        Err(_) => {
            debug!("probe of {} exceeded {:?}", host, guard);
            PingSample::unreachable(sampled_at)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProbeOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProber {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _host: &str, _count: u32, _timeout: Duration) -> anyhow::Result<ProbeOutcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Ok(ProbeOutcome::up(Some(3.5)))
            } else {
                anyhow::bail!("malformed ping output")
            }
        }
    }

    struct HangingProber;

    #[async_trait]
    impl Prober for HangingProber {
        async fn probe(&self, _host: &str, _count: u32, _timeout: Duration) -> anyhow::Result<ProbeOutcome> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ProbeOutcome::up(None))
        }
    }

    fn fast_settings() -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_millis(5),
            probe_count: 1,
            probe_timeout: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_probe_error_becomes_unreachable_sample() {
        let prober = CountingProber {
            calls: AtomicU32::new(1),
        };
        let sample = sample_once(&prober, "77.88.8.8", &fast_settings()).await;
        assert!(!sample.reachable);
        assert!(sample.round_trip_ms.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_is_cut_off() {
        let sample = sample_once(&HangingProber, "192.168.2.1", &fast_settings()).await;
        assert!(!sample.reachable);
    }

    #[tokio::test]
    async fn test_sampler_fills_history_and_stops() {
        let history = PingHistory::new("192.168.2.1", 4);
        let cancel = CancellationToken::new();
        let prober = Arc::new(CountingProber {
            calls: AtomicU32::new(0),
        });

        let sampler = PingSampler::spawn(
            HostRole::Router,
            history.clone(),
            prober.clone(),
            fast_settings(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        sampler.shutdown(Duration::from_secs(1)).await;

        assert_eq!(history.len(), 4);
        let calls_after_stop = prober.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), calls_after_stop);
    }

    #[tokio::test]
    async fn test_shutdown_is_bounded() {
        let history = PingHistory::new("77.88.8.8", 4);
        let cancel = CancellationToken::new();
        let settings = SamplerSettings {
            probe_timeout: Duration::from_secs(600),
            ..fast_settings()
        };
        let sampler = PingSampler::spawn(
            HostRole::Target,
            history,
            Arc::new(HangingProber),
            settings,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let started = std::time::Instant::now();
        sampler.shutdown(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
