//! Rotating retention slots
//!
//! Each cycle's artifacts land in generation 0. Before the next capture,
//! every family is shifted one generation older (K-1 -> K, ..., 0 -> 1), so
//! generations 1..=K always hold the K previous cycles, newest first.
//! Files are named `<kind>.g<generation>.<ext>` under the output root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MonitorError;
use crate::model::LogRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    StatusScreenshot,
    LogScreenshot,
    LogRows,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::StatusScreenshot,
        ArtifactKind::LogScreenshot,
        ArtifactKind::LogRows,
    ];

    fn stem(self) -> &'static str {
        match self {
            ArtifactKind::StatusScreenshot => "status",
            ArtifactKind::LogScreenshot => "log",
            ArtifactKind::LogRows => "logrows",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionSlots {
    root: PathBuf,
    generations: usize,
    screenshot_ext: String,
}

impl RetentionSlots {
    pub fn new(root: impl Into<PathBuf>, generations: usize, screenshot_ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            generations,
            screenshot_ext: screenshot_ext.into(),
        }
    }

    pub fn generations(&self) -> usize {
        self.generations
    }

    pub fn screenshot_ext(&self) -> &str {
        &self.screenshot_ext
    }

    pub fn slot_path(&self, kind: ArtifactKind, generation: usize) -> PathBuf {
        let ext = match kind {
            ArtifactKind::LogRows => "json",
            _ => self.screenshot_ext.as_str(),
        };
        self.root
            .join(format!("{}.g{}.{}", kind.stem(), generation, ext))
    }

    /// Shift every family one generation older, freeing generation 0
    ///
    /// A missing source is not an error (warm-up); its older neighbour is
    /// cleared instead so no slot ever claims the wrong age.
    pub async fn rotate(&self) -> Result<(), MonitorError> {
        for kind in ArtifactKind::ALL {
            for generation in (1..=self.generations).rev() {
                let src = self.slot_path(kind, generation - 1);
                let dst = self.slot_path(kind, generation);
                match tokio::fs::rename(&src, &dst).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        remove_if_exists(&dst).await?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        debug!("rotated {} retention generations", self.generations);
        Ok(())
    }

    /// Path of a slot if its file is currently present
    #[cfg(test)]
    pub async fn existing(&self, kind: ArtifactKind, generation: usize) -> Option<PathBuf> {
        let path = self.slot_path(kind, generation);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }

    pub async fn write_log_rows(&self, rows: &[LogRow]) -> Result<(), MonitorError> {
        let json = serde_json::to_vec_pretty(rows)?;
        tokio::fs::write(self.slot_path(ArtifactKind::LogRows, 0), json).await?;
        Ok(())
    }

    /// Log rows kept for `generation`, None when the slot is empty
    pub async fn read_log_rows(&self, generation: usize) -> Result<Option<Vec<LogRow>>, MonitorError> {
        match tokio::fs::read(self.slot_path(ArtifactKind::LogRows, generation)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), MonitorError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
