//! Linkwatch agent - router link drop monitor
//!
//! Wires the engine to the real world:
//! - Router status/log pages over HTTP (snapshots saved as HTML)
//! - Reachability through the system `ping`
//! - Ctrl-C stops the run; a summary is always written on the way out

mod config;
mod pinger;
mod router;

use anyhow::{Context, Result};
use linkwatch_core::{Collaborators, Monitor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::pinger::SystemPinger;
use crate::router::RouterClient;

const DEFAULT_LOG_FILTER: &str = "linkwatch=info,linkwatch_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Linkwatch agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load()
        .await
        .context("Failed to load configuration")?;
    let monitor_config = config
        .monitor_config()
        .context("Invalid monitor configuration")?;

    let router = Arc::new(
        RouterClient::new(&config.router, config.request_timeout()?)
            .context("Failed to create router client")?,
    );
    let collaborators = Collaborators {
        status: router.clone(),
        logs: router.clone(),
        screens: router,
    };

    let mut monitor = Monitor::new(monitor_config, collaborators)
        .await
        .context("Failed to prepare output directory")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping and writing the report...");
            on_signal.cancel();
        }
    });

    let report = monitor
        .run(Arc::new(SystemPinger::new()), cancel)
        .await
        .context("Monitoring failed")?;

    info!(
        "Done: {} drop events over {} cycles",
        report.events, report.cycles
    );
    Ok(())
}
