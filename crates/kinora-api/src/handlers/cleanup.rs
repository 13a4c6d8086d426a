//! Cleanup scheduler admin handlers.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::CleanupState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use kinora_core::models::{CleanupReport, CleanupTaskType, SchedulerStatus};

/// Current scheduler state and per-task run statistics
#[utoipa::path(
    get,
    path = "/api/v0/admin/cleanup/status",
    tag = "admin",
    responses(
        (status = 200, description = "Scheduler status", body = SchedulerStatus),
        (status = 401, description = "Missing or invalid master key", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn get_status(State(state): State<CleanupState>) -> impl IntoResponse {
    Json(state.scheduler.get_status())
}

/// Start the cron cadences. Starting a running scheduler is a no-op.
#[utoipa::path(
    post,
    path = "/api/v0/admin/cleanup/start",
    tag = "admin",
    responses(
        (status = 200, description = "Scheduler running", body = SchedulerStatus),
        (status = 401, description = "Missing or invalid master key", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn start_scheduler(State(state): State<CleanupState>) -> impl IntoResponse {
    state.scheduler.start();
    Json(state.scheduler.get_status())
}

/// Stop the cron cadences. A task already running finishes.
#[utoipa::path(
    post,
    path = "/api/v0/admin/cleanup/stop",
    tag = "admin",
    responses(
        (status = 200, description = "Scheduler stopped", body = SchedulerStatus),
        (status = 401, description = "Missing or invalid master key", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn stop_scheduler(State(state): State<CleanupState>) -> impl IntoResponse {
    state.scheduler.stop();
    Json(state.scheduler.get_status())
}

/// Run one cleanup task now
#[utoipa::path(
    post,
    path = "/api/v0/admin/cleanup/tasks/{task_type}/run",
    tag = "admin",
    params(
        ("task_type" = String, Path, description = "orphan_files, expired_transactions, incomplete_uploads or temp_files")
    ),
    responses(
        (status = 200, description = "Task finished", body = CleanupReport),
        (status = 400, description = "Unknown task type", body = ErrorResponse),
        (status = 401, description = "Missing or invalid master key", body = ErrorResponse),
        (status = 404, description = "Task not registered", body = ErrorResponse),
        (status = 409, description = "Scheduler is not running", body = ErrorResponse),
        (status = 500, description = "Task failed", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn run_task(
    State(state): State<CleanupState>,
    Path(task_type): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let task_type: CleanupTaskType = task_type.parse()?;
    let report = state.scheduler.execute_task_manually(task_type).await?;
    Ok(Json(report))
}
