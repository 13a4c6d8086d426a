//! Service wiring: upload tracker, cleanup tasks and scheduler.

use crate::state::{AppState, CleanupState, DbState, UploadState};
use anyhow::{Context, Result};
use chrono::TimeDelta;
use kinora_core::{Clock, Config, SystemClock};
use kinora_db::{MediaReferenceRepository, OrphanFileRepository, TransactionRepository};
use kinora_services::{
    BatchSettings, CleanupScheduler, CleanupTask, ExpiredTransactionCleaner,
    IncompleteUploadCleaner, OrphanCleanupSettings, OrphanFileCleaner, Storage, TempFileCleaner,
    UploadSessionStore,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Build the application state and start the scheduler when cleanup is enabled.
pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let state = build_state(config, pool, storage, Arc::new(SystemClock))?;

    if config.cleanup_enabled() {
        state.cleanup.scheduler.start();
    } else {
        tracing::info!("Cleanup scheduler disabled (CLEANUP_ENABLED=false)");
    }

    Ok(state)
}

/// Wire every component without starting anything.
pub fn build_state(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<AppState>> {
    let sessions = Arc::new(
        UploadSessionStore::new(clock.clone()).with_max_total_bytes(config.max_upload_size_bytes()),
    );

    let cleanup = config.cleanup();
    let batch = BatchSettings {
        batch_size: cleanup.batch_size,
        batch_delay: Duration::from_millis(cleanup.batch_delay_ms),
    };

    let orphan_settings = OrphanCleanupSettings {
        scan_prefix: cleanup.orphan_scan_prefix.clone(),
        min_object_age: TimeDelta::try_hours(cleanup.orphan_min_age_hours)
            .context("ORPHAN_MIN_AGE_HOURS is out of range")?,
        confirmation_window: TimeDelta::try_days(cleanup.orphan_confirmation_days)
            .context("ORPHAN_CONFIRMATION_DAYS is out of range")?,
        max_items: cleanup.max_items_per_run,
        batch,
    };

    let temp_file_max_age = TimeDelta::try_hours(cleanup.temp_file_max_age_hours)
        .context("TEMP_FILE_MAX_AGE_HOURS is out of range")?;

    let tasks: Vec<Arc<dyn CleanupTask>> = vec![
        Arc::new(OrphanFileCleaner::new(
            storage.clone(),
            Arc::new(OrphanFileRepository::new(pool.clone())),
            Arc::new(MediaReferenceRepository::new(pool.clone())),
            clock.clone(),
            orphan_settings,
        )),
        Arc::new(ExpiredTransactionCleaner::new(
            Arc::new(TransactionRepository::new(pool.clone())),
            clock.clone(),
            cleanup.max_items_per_run,
            batch,
        )),
        Arc::new(IncompleteUploadCleaner::new(
            sessions.clone(),
            Duration::from_secs(config.upload_session_ttl_secs()),
        )),
        Arc::new(TempFileCleaner::new(
            cleanup.temp_dir.clone(),
            temp_file_max_age,
            clock.clone(),
            batch,
        )),
    ];

    let scheduler = CleanupScheduler::new(tasks, &cleanup.cadences, clock)
        .context("Failed to build cleanup scheduler")?;

    tracing::info!(
        cadences = cleanup.cadences.len(),
        max_upload_size_bytes = config.max_upload_size_bytes(),
        session_ttl_secs = config.upload_session_ttl_secs(),
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        db: DbState { pool },
        uploads: UploadState { sessions, storage },
        cleanup: CleanupState {
            scheduler: Arc::new(scheduler),
        },
    }))
}
