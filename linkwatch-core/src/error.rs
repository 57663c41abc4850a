use thiserror::Error;

/// Errors surfaced by the monitoring engine
///
/// Probe failures and missing artifacts never show up here: the first are
/// recorded as unreachable samples, the second are omitted from bundles.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("{stage} collaborator failed: {message}")]
    Collaborator { stage: &'static str, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorError {
    /// Wrap a collaborator failure, keeping the whole context chain
    pub fn collaborator(stage: &'static str, err: anyhow::Error) -> Self {
        MonitorError::Collaborator {
            stage,
            message: format!("{err:#}"),
        }
    }
}
