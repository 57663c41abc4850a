//! OS `ping` collaborator
//!
//! Runs the system ping utility once per probe and reads its output:
//! - reachable when the reply mentions `ttl` (every locale keeps it)
//! - RTT from `time=1.23 ms` or `время=1,23 мс`
//! - Windows console output is OEM cp866, decoded before parsing
//! - non-zero exit codes are not errors, the output decides

use anyhow::{Context, Result};
use async_trait::async_trait;
use encoding_rs::IBM866;
use linkwatch_core::{ProbeOutcome, Prober};
use regex::Regex;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

static RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:time|время)\s*[=<]\s*([\d.,]+)\s*(?:ms|мс)").expect("valid rtt regex")
});

/// Extra time the ping process gets on top of its own deadline
const PROCESS_SLACK: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct SystemPinger;

impl SystemPinger {
    pub fn new() -> Self {
        Self
    }

    fn command(host: &str, count: u32, timeout: Duration) -> AsyncCommand {
        let mut cmd = AsyncCommand::new("ping");
        if cfg!(target_os = "windows") {
            // -w is per-reply timeout in milliseconds on Windows
            cmd.args([
                "-n",
                &count.to_string(),
                "-w",
                &timeout.as_millis().to_string(),
                host,
            ]);
        } else {
            // -w is the overall deadline in seconds elsewhere
            let deadline = timeout.as_secs().max(1) * u64::from(count.max(1));
            cmd.args(["-c", &count.to_string(), "-w", &deadline.to_string(), host]);
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Prober for SystemPinger {
    async fn probe(&self, host: &str, count: u32, timeout: Duration) -> Result<ProbeOutcome> {
        let budget = timeout * count.max(1) + PROCESS_SLACK;
        let output = tokio::time::timeout(budget, Self::command(host, count, timeout).output())
            .await
            .context("ping timed out")?
            .context("Failed to execute ping")?;

        let text = decode_ping_output(&output.stdout, cfg!(target_os = "windows"));
        let outcome = parse_ping_output(&text);
        debug!(
            "ping {} -> reachable={} rtt={:?} (exit {:?})",
            host,
            outcome.reachable,
            outcome.round_trip_ms,
            output.status.code()
        );
        Ok(outcome)
    }
}

/// Decode raw ping stdout; `oem` selects the cp866 console code page
pub fn decode_ping_output(bytes: &[u8], oem: bool) -> String {
    if oem {
        let (text, _) = IBM866.decode_without_bom_handling(bytes);
        text.into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Interpret ping output in any of the supported locales
pub fn parse_ping_output(output: &str) -> ProbeOutcome {
    if !output.to_lowercase().contains("ttl") {
        return ProbeOutcome::down();
    }

    let rtt = RTT
        .captures(output)
        .and_then(|caps| caps[1].replace(',', ".").parse::<f64>().ok());
    ProbeOutcome::up(rtt)
}
