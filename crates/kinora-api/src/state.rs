//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers can extract only what they
//! need via Axum's `FromRef`.

use axum::extract::FromRef;
use kinora_core::Config;
use kinora_services::{CleanupScheduler, Storage, UploadSessionStore};
use sqlx::PgPool;
use std::sync::Arc;

/// Database pool, used by readiness checks and the Postgres repositories.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
}

/// Chunked upload tracker and the storage completed uploads are written to.
#[derive(Clone)]
pub struct UploadState {
    pub sessions: Arc<UploadSessionStore>,
    pub storage: Arc<dyn Storage>,
}

#[derive(Clone)]
pub struct CleanupState {
    pub scheduler: Arc<CleanupScheduler>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub uploads: UploadState,
    pub cleanup: CleanupState,
}

impl FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl FromRef<Arc<AppState>> for UploadState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.uploads.clone()
    }
}

impl FromRef<Arc<AppState>> for CleanupState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.cleanup.clone()
    }
}
