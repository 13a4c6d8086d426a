use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kinora_core::models::{CleanupReport, CleanupTaskType};
use kinora_core::{AppError, Clock};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::batch::{process_in_batches, BatchSettings};
use super::task::CleanupTask;

/// Deletes stale files left behind in the service's scratch directory.
pub struct TempFileCleaner {
    temp_dir: PathBuf,
    max_age: Duration,
    clock: Arc<dyn Clock>,
    batch: BatchSettings,
}

impl TempFileCleaner {
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        max_age: Duration,
        clock: Arc<dyn Clock>,
        batch: BatchSettings,
    ) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            max_age,
            clock,
            batch,
        }
    }

    /// Regular files under the temp dir last modified before `cutoff`.
    async fn find_stale_files(&self, cutoff: DateTime<Utc>) -> Result<Vec<PathBuf>, AppError> {
        let mut stale = Vec::new();
        let mut pending = vec![self.temp_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                AppError::Internal(format!("Failed to read temp dir {}: {}", dir.display(), e))
            })?;

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    let modified: DateTime<Utc> = entry.metadata().await?.modified()?.into();
                    if modified < cutoff {
                        stale.push(entry.path());
                    }
                }
            }
        }

        Ok(stale)
    }

    async fn remove(path: PathBuf) -> Result<bool, AppError> {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            // Removed by its owner between detection and cleanup
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "Failed to delete temp file");
                Err(AppError::Internal(format!(
                    "Failed to delete {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

fn dir_exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

#[async_trait]
impl CleanupTask for TempFileCleaner {
    fn task_type(&self) -> CleanupTaskType {
        CleanupTaskType::TempFiles
    }

    #[tracing::instrument(skip(self), fields(cleanup.task = "temp_files", temp_dir = %self.temp_dir.display()))]
    async fn run(&self) -> Result<CleanupReport, AppError> {
        let started = std::time::Instant::now();
        let mut report = CleanupReport::empty(self.task_type());

        if !dir_exists(&self.temp_dir) {
            tracing::debug!("Temp dir does not exist, nothing to clean");
            return Ok(report);
        }

        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.max_age)
            .ok_or_else(|| AppError::InvalidInput("Temp file max age out of range".into()))?;
        let stale = self.find_stale_files(cutoff).await?;
        report.detected = stale.len() as u64;

        let outcome = process_in_batches(stale, self.batch, Self::remove).await;

        report.cleaned = outcome.cleaned;
        report.failed = outcome.failed;
        report.skipped = outcome.skipped;
        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            detected = report.detected,
            cleaned = report.cleaned,
            failed = report.failed,
            "Temp file cleanup complete"
        );

        Ok(report)
    }
}
