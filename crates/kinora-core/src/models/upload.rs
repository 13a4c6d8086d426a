//! Upload session models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Lifecycle of an upload session. `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Active,
    Completed,
    Cancelled,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Active)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStatus::Active => "active",
            UploadStatus::Completed => "completed",
            UploadStatus::Cancelled => "cancelled",
            UploadStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time view of a session, without its buffered chunks.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadSessionSnapshot {
    pub session_id: String,
    pub filename: String,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub chunk_count: usize,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Progress report returned by chunk, progress and cancel calls.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadProgress {
    pub session_id: String,
    pub filename: String,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub status: UploadStatus,
    /// Upload progress percentage (0-100)
    pub progress_percent: f64,
}

impl UploadProgress {
    pub fn percent(uploaded_bytes: u64, total_bytes: u64) -> f64 {
        if total_bytes > 0 {
            (uploaded_bytes as f64 / total_bytes as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// A completed session removed from the tracker, ready to be persisted.
#[derive(Debug, Clone)]
pub struct AssembledUpload {
    pub session_id: String,
    pub filename: String,
    pub data: Vec<u8>,
}
