//! End-to-end drop scenarios replayed through the harness

use linkwatch_core::{ArtifactKind, DropReason, HostRole, LogRow, MonitorError, MonitorPhase};
use linkwatch_devkit::{status_label, MonitorHarness, ScriptedProber};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_router_outage_fires_once() {
    let mut harness = MonitorHarness::new(|c| c.failure_limit = 3).await.unwrap();
    let script = [true, false, false, false, false];

    let mut fired = Vec::new();
    for (cycle, reachable) in script.into_iter().enumerate() {
        harness.push_ping(HostRole::Router, reachable);
        harness.push_ping(HostRole::Target, true);
        if let Some(event) = harness.cycle("1 ч 2 мин").await.unwrap() {
            fired.push((cycle, event.reason));
            assert_eq!(harness.monitor.state().detector.router_streak().count(), 0);
        }
    }

    assert_eq!(fired, vec![(3, DropReason::RouterPing)]);
    assert_eq!(harness.events().len(), 1);
}

#[tokio::test]
async fn test_uptime_reset_fires_once() {
    let mut harness = MonitorHarness::new(|_| {}).await.unwrap();

    let mut fired = Vec::new();
    for (cycle, secs) in [100, 160, 220, 40, 100].into_iter().enumerate() {
        if let Some(event) = harness.cycle(&format!("{secs} сек")).await.unwrap() {
            fired.push((cycle, event.reason));
        }
    }

    assert_eq!(fired, vec![(3, DropReason::UptimeReset)]);
}

#[tokio::test]
async fn test_uptime_reset_wins_over_ping_streak() {
    let mut harness = MonitorHarness::new(|c| c.failure_limit = 2).await.unwrap();

    harness.push_ping(HostRole::Router, false);
    harness.cycle("10 мин").await.unwrap();
    harness.push_ping(HostRole::Router, false);
    let event = harness.cycle("1 мин").await.unwrap().unwrap();
    assert_eq!(event.reason, DropReason::UptimeReset);

    // the outage is still the same one, no second event
    harness.push_ping(HostRole::Router, false);
    assert!(harness.cycle("2 мин").await.unwrap().is_none());
    harness.push_ping(HostRole::Router, false);
    assert!(harness.cycle("3 мин").await.unwrap().is_none());

    // recovery re-arms the router
    harness.push_ping(HostRole::Router, true);
    harness.cycle("4 мин").await.unwrap();
    harness.push_ping(HostRole::Router, false);
    harness.cycle("5 мин").await.unwrap();
    harness.push_ping(HostRole::Router, false);
    let event = harness.cycle("6 мин").await.unwrap().unwrap();
    assert_eq!(event.reason, DropReason::RouterPing);
}

#[tokio::test]
async fn test_target_outage_is_reported() {
    let mut harness = MonitorHarness::new(|c| c.failure_limit = 3).await.unwrap();

    let mut reasons = Vec::new();
    for _ in 0..4 {
        harness.push_ping(HostRole::Router, true);
        harness.push_ping(HostRole::Target, false);
        if let Some(event) = harness.cycle("2 ч").await.unwrap() {
            reasons.push(event.reason);
        }
    }

    assert_eq!(reasons, vec![DropReason::TargetPing]);
}

#[tokio::test]
async fn test_rotation_keeps_trailing_generations() {
    let mut harness = MonitorHarness::new(|c| c.generations = 2).await.unwrap();

    for secs in [10, 20, 30, 40] {
        harness.cycle(&format!("{secs} сек")).await.unwrap();
    }

    let status = |g| harness.read_slot(ArtifactKind::StatusScreenshot, g);
    assert_eq!(status(0), Some(status_label(3)));
    assert_eq!(status(1), Some(status_label(2)));
    assert_eq!(status(2), Some(status_label(1)));
    assert_eq!(status(3), None);
    assert!(harness.read_slot(ArtifactKind::LogRows, 2).is_some());
}

#[tokio::test]
async fn test_bundle_holds_before_after_and_ping_window() {
    let mut harness = MonitorHarness::new(|c| {
        c.generations = 2;
        c.ping_window = Duration::from_secs(120);
    })
    .await
    .unwrap();
    harness.router.set_log_rows(vec![
        LogRow::new("1", "01.01.2024 11:58", "PPPoE up"),
        LogRow::new("2", "01.01.2024 11:59", "PON link down"),
    ]);

    for uptime in ["3 мин", "4 мин", "5 мин"] {
        harness.cycle(uptime).await.unwrap();
    }

    let detected_at = harness.now();
    let seconds = chrono::Duration::seconds;
    harness.push_ping_at(HostRole::Router, true, detected_at - seconds(200));
    harness.push_ping_at(HostRole::Router, true, detected_at - seconds(120));
    harness.push_ping_at(HostRole::Router, true, detected_at - seconds(10));
    harness.push_ping_at(HostRole::Target, false, detected_at - seconds(1));

    let event = harness.cycle("7 сек").await.unwrap().unwrap();
    assert_eq!(event.index, 0);
    assert_eq!(event.reason, DropReason::UptimeReset);
    assert_eq!(event.detected_at, detected_at);

    let dir = &event.directory;
    let read = |name: &str| std::fs::read_to_string(dir.join(name)).ok();
    assert_eq!(read("status_after.txt"), Some(status_label(3)));
    assert_eq!(read("status_before_1.txt"), Some(status_label(2)));
    assert_eq!(read("status_before_2.txt"), Some(status_label(1)));
    assert!(read("log_before_1.txt").is_some());
    assert!(read("log_after.txt").is_some());

    let previous: serde_json::Value =
        serde_json::from_str(&read("status_before.json").unwrap()).unwrap();
    assert_eq!(previous["status"]["uptime"], "5 мин");

    assert_eq!(event.prior_records.len(), 2);
    assert_eq!(event.prior_records[0].status.uptime, "4 мин");
    assert_eq!(event.before.len(), 2);
    assert_eq!(event.before[0].log_rows.as_ref().map(Vec::len), Some(2));

    // 200s-old sample falls outside, the 120s boundary stays in
    assert_eq!(event.pings.router.len(), 2);
    assert_eq!(event.pings.target.len(), 1);

    let json = harness.read_event(0).unwrap();
    assert_eq!(json["reason"], "uptime_reset");
    assert_eq!(json["pings"]["window_secs"], 120);
}

#[tokio::test]
async fn test_early_drop_omits_missing_generations() {
    let mut harness = MonitorHarness::new(|c| {
        c.generations = 2;
        c.failure_limit = 1;
    })
    .await
    .unwrap();

    harness.push_ping(HostRole::Router, false);
    let event = harness.cycle("1 мин").await.unwrap().unwrap();
    assert_eq!(event.reason, DropReason::RouterPing);
    assert!(event.before.is_empty());
    assert!(event.prior_records.is_empty());
    assert!(!event.directory.join("status_before.json").exists());
    assert!(event.directory.join("status_after.txt").exists());

    harness.push_ping(HostRole::Router, true);
    harness.cycle("2 мин").await.unwrap();
    let event = harness.cycle("1 сек").await.unwrap().unwrap();
    assert_eq!(event.before.len(), 2);

    let mut harness = MonitorHarness::new(|c| c.generations = 2).await.unwrap();
    harness.cycle("2 мин").await.unwrap();
    let event = harness.cycle("1 мин").await.unwrap().unwrap();
    assert_eq!(event.before.len(), 1);
    assert_eq!(event.before[0].generation, 1);
    assert!(!event.directory.join("status_before_2.txt").exists());
}

#[tokio::test]
async fn test_events_get_sequential_directories() {
    let mut harness = MonitorHarness::new(|_| {}).await.unwrap();

    for uptime in ["5 мин", "1 мин", "2 мин", "30 сек"] {
        harness.cycle(uptime).await.unwrap();
    }

    let indices: Vec<u32> = harness.events().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1]);
    let events_dir = harness.monitor.config().events_dir();
    assert!(events_dir.join("000").join("event.json").exists());
    assert!(events_dir.join("001").join("event.json").exists());
    assert_eq!(harness.read_event(1).unwrap()["index"], 1);
}

#[tokio::test]
async fn test_record_history_is_capped() {
    let mut harness = MonitorHarness::new(|c| c.record_history_cap = 100).await.unwrap();

    for cycle in 0..120u32 {
        harness.cycle(&format!("{} сек", cycle + 1)).await.unwrap();
    }

    let records = &harness.monitor.state().records;
    assert_eq!(records.len(), 100);
    assert_eq!(records.latest().unwrap().status.uptime_seconds, 120);
    assert_eq!(harness.monitor.state().cycles, 120);
}

fn live_prober(harness: &MonitorHarness) -> ScriptedProber {
    let prober = ScriptedProber::new();
    let config = harness.monitor.config();
    prober.always_up(&config.router_host, 1.5);
    prober.always_up(&config.target_host, 20.0);
    prober
}

fn read_report(harness: &MonitorHarness) -> serde_json::Value {
    let bytes = std::fs::read(harness.monitor.config().report_path()).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_run_until_cancelled_writes_summary() {
    let mut harness = MonitorHarness::new(|c| {
        c.cycle_period = Duration::from_millis(20);
        c.ping_interval = Duration::from_millis(5);
    })
    .await
    .unwrap();
    harness.router.push_uptime("1 д 2 ч");
    let prober = live_prober(&harness);

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stopper.cancel();
    });

    let report = harness
        .monitor
        .run(Arc::new(prober.clone()), cancel)
        .await
        .unwrap();

    assert_eq!(harness.monitor.phase(), MonitorPhase::Stopped);
    assert!(report.cycles >= 1);
    assert_eq!(report.events, 0);
    assert!(!harness.monitor.router_history().is_empty());
    assert!(!harness.monitor.target_history().is_empty());
    assert!(prober.calls(&harness.monitor.config().router_host) >= 1);

    let json = read_report(&harness);
    assert_eq!(json["outcome"], "interrupted");
    assert_eq!(json["pings"]["router"], "192.168.2.1");
    assert_eq!(json["check_period"], 0.02);
}

#[tokio::test]
async fn test_run_stops_on_fatal_error_with_summary() {
    let mut harness = MonitorHarness::new(|c| {
        c.cycle_period = Duration::from_millis(10);
        c.ping_interval = Duration::from_millis(5);
    })
    .await
    .unwrap();
    harness.router.push_uptime("3 ч");
    harness.router.fail_status_from(2);
    let prober = live_prober(&harness);

    let err = harness
        .monitor
        .run(Arc::new(prober), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MonitorError::Collaborator { stage: "status", .. }));
    assert_eq!(harness.monitor.phase(), MonitorPhase::Stopped);
    assert_eq!(harness.monitor.state().cycles, 2);

    let json = read_report(&harness);
    assert_eq!(json["cycles"], 2);
    let message = json["outcome"]["failed"].as_str().unwrap();
    assert!(message.contains("status"));
}
