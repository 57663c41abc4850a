//! Router web-page collaborator
//!
//! Reads the device's status and log pages over HTTP:
//! - status fields are label/value cell pairs in the info table
//! - log rows come from the `newtablelist` table (header row skipped)
//! - a "screenshot" is the fetched page saved as HTML
//!
//! Session handling is out of scope; the pages must be reachable as-is.

use anyhow::{Context, Result};
use async_trait::async_trait;
use linkwatch_core::{LogRow, LogSource, PageView, Screenshotter, StatusSource};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::config::RouterSection;

/// Status key -> label shown next to its value on the device page
pub const STATUS_LABELS: [(&str, &str); 9] = [
    ("uptime", "Время подключения"),
    ("iface_uptime", "Время работы интерфейса"),
    ("cpu", "Загрузка процессора"),
    ("cpu_temp", "Температура CPU"),
    ("optical_power", "Оптическая мощность"),
    ("optical_temp", "Температура опт. модуля"),
    ("mac", "MAC-адрес устройства"),
    ("ip", "IP-адрес"),
    ("fw_version", "Версия ПО:"),
];

static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("valid cell regex"));
static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("valid row regex"));
static LOG_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<table[^>]*id\s*=\s*["']?newtablelist["']?[^>]*>(.*?)</table>"#)
        .expect("valid table regex")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

pub struct RouterClient {
    http: reqwest::Client,
    status_url: String,
    log_url: String,
}

impl RouterClient {
    pub fn new(section: &RouterSection, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base = section.base_url.trim_end_matches('/');

        Ok(Self {
            http,
            status_url: format!("{}{}", base, section.status_path),
            log_url: format!("{}{}", base, section.log_path),
        })
    }

    fn url_for(&self, view: PageView) -> &str {
        match view {
            PageView::Status => &self.status_url,
            PageView::Log => &self.log_url,
        }
    }

    async fn fetch(&self, view: PageView) -> Result<String> {
        let url = self.url_for(view);
        debug!("GET {}", url);
        let body = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?
            .text()
            .await
            .with_context(|| format!("Failed to read {url}"))?;
        Ok(body)
    }
}

#[async_trait]
impl StatusSource for RouterClient {
    async fn status(&self) -> Result<BTreeMap<String, String>> {
        let page = self.fetch(PageView::Status).await?;
        Ok(parse_status_page(&page))
    }
}

#[async_trait]
impl LogSource for RouterClient {
    async fn log_rows(&self, max_rows: Option<usize>) -> Result<Vec<LogRow>> {
        let page = self.fetch(PageView::Log).await?;
        Ok(parse_log_table(&page, max_rows))
    }
}

#[async_trait]
impl Screenshotter for RouterClient {
    async fn capture(&self, view: PageView, dest: &Path) -> Result<()> {
        let page = self.fetch(view).await?;
        tokio::fs::write(dest, page)
            .await
            .with_context(|| format!("Failed to save {}", dest.display()))?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "html"
    }
}

/// Visible text of an HTML fragment, whitespace-trimmed
fn cell_text(fragment: &str) -> String {
    TAG.replace_all(fragment, " ")
        .replace("&nbsp;", " ")
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every known status key, "" when its label is absent
pub fn parse_status_page(html: &str) -> BTreeMap<String, String> {
    let cells: Vec<String> = CELL
        .captures_iter(html)
        .map(|caps| cell_text(&caps[1]))
        .collect();

    STATUS_LABELS
        .iter()
        .map(|(key, label)| {
            let value = cells
                .iter()
                .position(|cell| cell.contains(label))
                .and_then(|i| cells.get(i + 1))
                .cloned()
                .unwrap_or_default();
            (key.to_string(), value)
        })
        .collect()
}

/// Rows of the `newtablelist` table with at least three cells
pub fn parse_log_table(html: &str, max_rows: Option<usize>) -> Vec<LogRow> {
    let Some(table) = LOG_TABLE.captures(html) else {
        return Vec::new();
    };

    let limit = max_rows.filter(|n| *n > 0).unwrap_or(usize::MAX);
    ROW.captures_iter(&table[1])
        .skip(1)
        .take(limit)
        .filter_map(|row| {
            let cells: Vec<String> = CELL
                .captures_iter(&row[1])
                .map(|caps| cell_text(&caps[1]))
                .collect();
            (cells.len() >= 3).then(|| LogRow::new(&cells[0], &cells[1], &cells[2]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_PAGE: &str = r#"
        <table>
          <tr><td class="l">Время подключения</td><td>0 сут 3 ч&nbsp;12 мин 5 сек</td></tr>
          <tr><td>Загрузка процессора</td><td><span>12%</span></td></tr>
          <tr><td>MAC-адрес устройства</td><td>AA:BB:CC:DD:EE:FF</td></tr>
          <tr><td>IP-адрес</td><td> 10.20.30.40 </td></tr>
        </table>"#;

    const LOG_PAGE: &str = r#"
        <table id="other"><tr><td>x</td><td>y</td><td>z</td></tr></table>
        <table id="newtablelist">
          <tr><td>№</td><td>Дата</td><td>Событие</td></tr>
          <tr><td>3</td><td>2024-05-01 10:02:00</td><td>PPPoE connected</td></tr>
          <tr><td>2</td><td>2024-05-01 10:01:00</td><td>WAN link down</td></tr>
          <tr><td>broken</td></tr>
          <tr><td>1</td><td>2024-05-01 10:00:00</td><td>System start</td></tr>
        </table>"#;

    #[test]
    fn test_status_fields_extracted() {
        let fields = parse_status_page(STATUS_PAGE);
        assert_eq!(fields["uptime"], "0 сут 3 ч 12 мин 5 сек");
        assert_eq!(fields["cpu"], "12%");
        assert_eq!(fields["mac"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(fields["ip"], "10.20.30.40");
        assert_eq!(fields["fw_version"], "");
        assert_eq!(fields.len(), STATUS_LABELS.len());
    }

    #[test]
    fn test_log_rows_skip_header_and_short_rows() {
        let rows = parse_log_table(LOG_PAGE, None);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], LogRow::new("3", "2024-05-01 10:02:00", "PPPoE connected"));
        assert_eq!(rows[2].event, "System start");
    }

    #[test]
    fn test_log_rows_respect_max_rows() {
        let rows = parse_log_table(LOG_PAGE, Some(2));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].event, "WAN link down");
    }

    #[test]
    fn test_missing_log_table() {
        assert!(parse_log_table("<html></html>", None).is_empty());
    }

    #[test]
    fn test_client_urls() {
        let section = RouterSection {
            base_url: "http://192.168.2.1/".into(),
            ..RouterSection::default()
        };
        let client = RouterClient::new(&section, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url_for(PageView::Status),
            "http://192.168.2.1/status/st_deviceinfo_tl.htm"
        );
        assert_eq!(client.extension(), "html");
    }
}
