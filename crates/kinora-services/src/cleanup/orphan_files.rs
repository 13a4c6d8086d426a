//! Orphan file cleanup.
//!
//! Objects under the scan prefix that no media row references are tracked in
//! `orphan_files`. A tracked object is deleted only once it has been seen
//! unreferenced on two passes at least `confirmation_window` apart, so a file
//! whose media row is written a little after the upload is never lost.

use async_trait::async_trait;
use chrono::Duration;
use kinora_core::models::{CleanupReport, CleanupTaskType, OrphanFile, OrphanUpsert};
use kinora_core::{AppError, Clock};
use kinora_db::{MediaReferenceSource, OrphanFileStore};
use kinora_storage::Storage;
use std::collections::HashSet;
use std::sync::Arc;

use super::batch::{process_in_batches, BatchSettings};
use super::task::CleanupTask;

/// Keys sent to the reference lookup per query.
const REFERENCE_LOOKUP_CHUNK: usize = 1000;

#[derive(Debug, Clone)]
pub struct OrphanCleanupSettings {
    pub scan_prefix: String,
    /// Objects younger than this are never considered
    pub min_object_age: Duration,
    pub confirmation_window: Duration,
    /// Cap on confirmed orphans deleted per run
    pub max_items: i64,
    pub batch: BatchSettings,
}

impl Default for OrphanCleanupSettings {
    fn default() -> Self {
        Self {
            scan_prefix: "uploads/".to_string(),
            min_object_age: Duration::hours(24),
            confirmation_window: Duration::days(7),
            max_items: 1000,
            batch: BatchSettings::default(),
        }
    }
}

pub struct OrphanFileCleaner {
    storage: Arc<dyn Storage>,
    orphans: Arc<dyn OrphanFileStore>,
    references: Arc<dyn MediaReferenceSource>,
    clock: Arc<dyn Clock>,
    settings: OrphanCleanupSettings,
}

impl OrphanFileCleaner {
    pub fn new(
        storage: Arc<dyn Storage>,
        orphans: Arc<dyn OrphanFileStore>,
        references: Arc<dyn MediaReferenceSource>,
        clock: Arc<dyn Clock>,
        settings: OrphanCleanupSettings,
    ) -> Self {
        Self {
            storage,
            orphans,
            references,
            clock,
            settings,
        }
    }

    async fn referenced_keys(&self, keys: &[String]) -> Result<HashSet<String>, AppError> {
        let mut referenced = HashSet::new();
        for chunk in keys.chunks(REFERENCE_LOOKUP_CHUNK) {
            referenced.extend(self.references.referenced_keys(chunk).await?);
        }
        Ok(referenced)
    }

    async fn delete_orphan(&self, orphan: OrphanFile) -> Result<bool, AppError> {
        match self.storage.delete(&orphan.storage_key).await {
            Ok(()) => {
                self.orphans
                    .mark_cleaned(orphan.id, self.clock.now())
                    .await?;
                tracing::debug!(storage_key = %orphan.storage_key, "Deleted orphan file");
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    error = %message,
                    storage_key = %orphan.storage_key,
                    "Failed to delete orphan file"
                );
                if let Err(mark_err) = self.orphans.mark_failed(orphan.id, &message).await {
                    tracing::error!(
                        error = %mark_err,
                        storage_key = %orphan.storage_key,
                        "Failed to record orphan deletion failure"
                    );
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl CleanupTask for OrphanFileCleaner {
    fn task_type(&self) -> CleanupTaskType {
        CleanupTaskType::OrphanFiles
    }

    #[tracing::instrument(skip(self), fields(cleanup.task = "orphan_files", prefix = %self.settings.scan_prefix))]
    async fn run(&self) -> Result<CleanupReport, AppError> {
        let started = std::time::Instant::now();
        let mut report = CleanupReport::empty(self.task_type());

        // Detect
        let objects = self.storage.list(&self.settings.scan_prefix).await?;
        let keys: Vec<String> = objects.iter().map(|object| object.key.clone()).collect();
        let referenced = self.referenced_keys(&keys).await?;

        let checked_at = self.clock.now();
        let candidates: Vec<OrphanUpsert> = objects
            .into_iter()
            .filter(|object| !referenced.contains(&object.key))
            .filter(|object| checked_at - object.last_modified >= self.settings.min_object_age)
            .map(|object| OrphanUpsert {
                storage_key: object.key,
                file_size: i64::try_from(object.size).unwrap_or(i64::MAX),
                last_modified: object.last_modified,
            })
            .collect();

        self.orphans
            .upsert_detected(&candidates, checked_at)
            .await?;
        let untracked = self.orphans.remove_stale_pending(checked_at).await?;

        let confirmed_before = checked_at
            .checked_sub_signed(self.settings.confirmation_window)
            .ok_or_else(|| AppError::InvalidInput("Confirmation window out of range".into()))?;
        let confirmed = self
            .orphans
            .list_confirmed(checked_at, confirmed_before, self.settings.max_items)
            .await?;

        report.detected = candidates.len() as u64;
        report.skipped = report.detected.saturating_sub(confirmed.len() as u64);

        tracing::info!(
            scanned = keys.len(),
            referenced = referenced.len(),
            candidates = candidates.len(),
            confirmed = confirmed.len(),
            untracked,
            "Orphan detection complete"
        );

        // Cleanup
        let outcome = process_in_batches(confirmed, self.settings.batch, |orphan| {
            self.delete_orphan(orphan)
        })
        .await;

        report.cleaned = outcome.cleaned;
        report.failed = outcome.failed;
        report.skipped += outcome.skipped;
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }
}
