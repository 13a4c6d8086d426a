use async_trait::async_trait;
use kinora_core::models::{CleanupReport, CleanupTaskType};
use kinora_core::AppError;
use std::sync::Arc;
use std::time::Duration;

use super::task::CleanupTask;
use crate::upload::UploadSessionStore;

/// Drops upload sessions idle for longer than the configured TTL.
pub struct IncompleteUploadCleaner {
    sessions: Arc<UploadSessionStore>,
    max_age: Duration,
}

impl IncompleteUploadCleaner {
    pub fn new(sessions: Arc<UploadSessionStore>, max_age: Duration) -> Self {
        Self { sessions, max_age }
    }
}

#[async_trait]
impl CleanupTask for IncompleteUploadCleaner {
    fn task_type(&self) -> CleanupTaskType {
        CleanupTaskType::IncompleteUploads
    }

    #[tracing::instrument(skip(self), fields(cleanup.task = "incomplete_uploads", max_age_secs = self.max_age.as_secs()))]
    async fn run(&self) -> Result<CleanupReport, AppError> {
        let started = std::time::Instant::now();
        let swept = self.sessions.sweep_expired(self.max_age) as u64;

        Ok(CleanupReport {
            task_type: self.task_type(),
            detected: swept,
            cleaned: swept,
            failed: 0,
            skipped: 0,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}
