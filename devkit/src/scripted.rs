/*!
Scripted collaborators for linkwatch tests

Stand-ins for the router pages, the screenshot tool and OS ping that
replay a script instead of touching the network:
- `ScriptedRouter`: uptime texts served in order, fixed log rows,
  optional status failure, screenshots written as small text files
- `ScriptedProber`: per-host outcome queues, last outcome repeats
*/

use anyhow::Result;
use async_trait::async_trait;
use linkwatch_core::{LogRow, LogSource, PageView, ProbeOutcome, Prober, Screenshotter, StatusSource};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RouterScript {
    uptimes: VecDeque<String>,
    last_uptime: String,
    fields: BTreeMap<String, String>,
    log_rows: Vec<LogRow>,
    fail_status_from: Option<usize>,
    status_calls: usize,
    captures: Vec<(PageView, PathBuf)>,
}

/// Router double implementing the status, log and screenshot ports
#[derive(Clone, Default)]
pub struct ScriptedRouter {
    script: Arc<Mutex<RouterScript>>,
}

impl ScriptedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue uptime texts, one per status call; the last one repeats
    pub fn with_uptimes<I, S>(self, uptimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock()
            .uptimes
            .extend(uptimes.into_iter().map(Into::into));
        self
    }

    pub fn push_uptime(&self, uptime: impl Into<String>) {
        self.script.lock().uptimes.push_back(uptime.into());
    }

    pub fn set_field(&self, key: impl Into<String>, value: impl Into<String>) {
        self.script.lock().fields.insert(key.into(), value.into());
    }

    pub fn set_log_rows(&self, rows: Vec<LogRow>) {
        self.script.lock().log_rows = rows;
    }

    /// Status calls number `calls` and later fail
    pub fn fail_status_from(&self, calls: usize) {
        self.script.lock().fail_status_from = Some(calls);
    }

    pub fn status_calls(&self) -> usize {
        self.script.lock().status_calls
    }

    pub fn captures(&self) -> Vec<(PageView, PathBuf)> {
        self.script.lock().captures.clone()
    }
}

#[async_trait]
impl StatusSource for ScriptedRouter {
    async fn status(&self) -> Result<BTreeMap<String, String>> {
        let mut script = self.script.lock();
        let call = script.status_calls;
        script.status_calls += 1;

        if script.fail_status_from.is_some_and(|from| call >= from) {
            anyhow::bail!("status page unavailable (scripted failure at call {call})");
        }

        if let Some(next) = script.uptimes.pop_front() {
            script.last_uptime = next;
        }
        let mut fields = script.fields.clone();
        fields.insert("uptime".to_string(), script.last_uptime.clone());
        Ok(fields)
    }
}

#[async_trait]
impl LogSource for ScriptedRouter {
    async fn log_rows(&self, max_rows: Option<usize>) -> Result<Vec<LogRow>> {
        let rows = self.script.lock().log_rows.clone();
        Ok(match max_rows {
            Some(n) => rows.into_iter().take(n).collect(),
            None => rows,
        })
    }
}

#[async_trait]
impl Screenshotter for ScriptedRouter {
    /// Writes `"<view> #<cycle>"`, cycle counted from the status calls
    async fn capture(&self, view: PageView, dest: &Path) -> Result<()> {
        let cycle = {
            let mut script = self.script.lock();
            script.captures.push((view, dest.to_path_buf()));
            script.status_calls.saturating_sub(1)
        };
        let label = match view {
            PageView::Status => "status",
            PageView::Log => "log",
        };
        tokio::fs::write(dest, format!("{label} #{cycle}")).await?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "txt"
    }
}

/// Label written by `ScriptedRouter` for a status capture of `cycle`
pub fn status_label(cycle: usize) -> String {
    format!("status #{cycle}")
}

#[derive(Default)]
struct ProbeScript {
    queues: HashMap<String, VecDeque<Option<ProbeOutcome>>>,
    last: HashMap<String, Option<ProbeOutcome>>,
    calls: HashMap<String, usize>,
}

/// Reachability double; `None` in a script means "probe errored"
#[derive(Clone, Default)]
pub struct ScriptedProber {
    script: Arc<Mutex<ProbeScript>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, host: &str, outcomes: impl IntoIterator<Item = Option<ProbeOutcome>>) {
        self.script
            .lock()
            .queues
            .entry(host.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Every probe of `host` answers up with `rtt_ms`
    pub fn always_up(&self, host: &str, rtt_ms: f64) {
        self.script(host, [Some(ProbeOutcome::up(Some(rtt_ms)))]);
    }

    pub fn calls(&self, host: &str) -> usize {
        self.script.lock().calls.get(host).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, host: &str, _count: u32, _timeout: Duration) -> Result<ProbeOutcome> {
        let outcome = {
            let mut script = self.script.lock();
            *script.calls.entry(host.to_string()).or_default() += 1;
            let next = script.queues.get_mut(host).and_then(VecDeque::pop_front);
            match next {
                Some(outcome) => {
                    script.last.insert(host.to_string(), outcome);
                    outcome
                }
                None => script.last.get(host).copied().unwrap_or(None),
            }
        };

        outcome.ok_or_else(|| anyhow::anyhow!("scripted probe failure for {host}"))
    }
}
