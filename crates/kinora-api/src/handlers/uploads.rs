//! Chunked upload handlers.
//!
//! Clients open a session, stream raw chunks into it and complete it once
//! every declared byte has arrived. Completion persists the assembled file
//! under `uploads/{session_id}/{filename}`.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::UploadState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use kinora_core::models::{UploadProgress, UploadSessionSnapshot};
use kinora_storage::upload_key;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Request to open a chunked upload session
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUploadSessionRequest {
    /// Client-chosen session ID; a UUID is generated when omitted
    #[serde(default)]
    pub session_id: Option<String>,
    /// Original filename
    pub filename: String,
    /// Total file size in bytes
    pub total_bytes: u64,
}

/// Where a completed upload was persisted
#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub session_id: String,
    pub storage_key: String,
    pub url: String,
    pub size: u64,
}

/// Open a chunked upload session
#[utoipa::path(
    post,
    path = "/api/v0/uploads/sessions",
    tag = "uploads",
    request_body = CreateUploadSessionRequest,
    responses(
        (status = 201, description = "Upload session created", body = UploadSessionSnapshot),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Session ID already in use", body = ErrorResponse),
        (status = 413, description = "Declared size exceeds the upload limit", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<UploadState>,
    ValidatedJson(request): ValidatedJson<CreateUploadSessionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Reject names that could never be stored before any bytes arrive
    upload_key(&session_id, &request.filename)?;

    let snapshot =
        state
            .sessions
            .create_session(&session_id, &request.filename, request.total_bytes)?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Append a chunk to an upload session. The request body is the raw chunk.
#[utoipa::path(
    put,
    path = "/api/v0/uploads/sessions/{session_id}/chunks",
    tag = "uploads",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Chunk accepted", body = UploadProgress),
        (status = 400, description = "Chunk overflows the declared size", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session is no longer active", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    State(state): State<UploadState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let progress = state.sessions.accept_chunk(&session_id, body)?;
    Ok(Json(progress))
}

/// Get upload progress
#[utoipa::path(
    get,
    path = "/api/v0/uploads/sessions/{session_id}",
    tag = "uploads",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Upload progress", body = UploadProgress),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_progress(
    State(state): State<UploadState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.sessions.get_progress(&session_id)?))
}

/// Cancel an upload session
#[utoipa::path(
    post,
    path = "/api/v0/uploads/sessions/{session_id}/cancel",
    tag = "uploads",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Session cancelled", body = UploadProgress),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session already finished", body = ErrorResponse)
    )
)]
pub async fn cancel_session(
    State(state): State<UploadState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.sessions.cancel(&session_id)?))
}

/// Persist a completed upload and release its session
#[utoipa::path(
    post,
    path = "/api/v0/uploads/sessions/{session_id}/complete",
    tag = "uploads",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Upload stored", body = CompleteUploadResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session has not received every byte or is already being finalized", body = ErrorResponse),
        (status = 500, description = "Storage failure; the session is marked as errored", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(upload.session_id = %session_id))]
pub async fn complete_session(
    State(state): State<UploadState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let progress = state.sessions.get_progress(&session_id)?;
    let storage_key = upload_key(&progress.session_id, &progress.filename)?;

    // The session stays tracked until the bytes are safely stored
    let assembled = state.sessions.begin_finalize(&session_id)?;
    let size = assembled.data.len() as u64;

    let url = match state
        .storage
        .upload_with_key(&storage_key, assembled.data, UPLOAD_CONTENT_TYPE)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, storage_key = %storage_key, "Failed to persist completed upload");
            if let Err(mark_err) = state.sessions.mark_error(&session_id, &e.to_string()) {
                tracing::warn!(error = %mark_err, "Could not mark upload session as errored");
            }
            return Err(e.into());
        }
    };

    state.sessions.take_completed(&session_id)?;
    tracing::info!(storage_key = %storage_key, size, "Upload persisted");

    Ok(Json(CompleteUploadResponse {
        session_id,
        storage_key,
        url,
        size,
    }))
}

/// List every tracked upload session (admin)
#[utoipa::path(
    get,
    path = "/api/v0/admin/uploads",
    tag = "admin",
    responses(
        (status = 200, description = "Tracked sessions, oldest first", body = Vec<UploadSessionSnapshot>),
        (status = 401, description = "Missing or invalid master key", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn list_sessions(State(state): State<UploadState>) -> impl IntoResponse {
    Json(state.sessions.list())
}
