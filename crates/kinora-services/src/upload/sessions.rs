//! In-memory upload session store.
//!
//! Sessions live only in this process: a restart loses every in-flight upload.
//! The map is sharded, so chunks for one session are applied under that entry's
//! lock while chunks for different sessions proceed in parallel.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kinora_core::models::{AssembledUpload, UploadProgress, UploadSessionSnapshot, UploadStatus};
use kinora_core::{AppError, Clock};
use std::sync::Arc;
use std::time::Duration;

struct UploadSession {
    session_id: String,
    filename: String,
    total_bytes: u64,
    uploaded_bytes: u64,
    status: UploadStatus,
    chunks: Vec<Bytes>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    error_message: Option<String>,
    /// Set while the assembled bytes are being written to storage
    finalizing: bool,
}

impl UploadSession {
    fn progress(&self) -> UploadProgress {
        UploadProgress {
            session_id: self.session_id.clone(),
            filename: self.filename.clone(),
            uploaded_bytes: self.uploaded_bytes,
            total_bytes: self.total_bytes,
            status: self.status,
            progress_percent: UploadProgress::percent(self.uploaded_bytes, self.total_bytes),
        }
    }

    fn snapshot(&self) -> UploadSessionSnapshot {
        UploadSessionSnapshot {
            session_id: self.session_id.clone(),
            filename: self.filename.clone(),
            total_bytes: self.total_bytes,
            uploaded_bytes: self.uploaded_bytes,
            chunk_count: self.chunks.len(),
            status: self.status,
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }

    fn fail(&mut self, message: String, now: DateTime<Utc>) {
        self.status = UploadStatus::Error;
        self.error_message = Some(message);
        self.last_activity = now;
        self.finalizing = false;
    }
}

/// Tracks chunked uploads until they are persisted, cancelled or swept.
pub struct UploadSessionStore {
    sessions: DashMap<String, UploadSession>,
    clock: Arc<dyn Clock>,
    max_total_bytes: Option<u64>,
}

impl UploadSessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
            max_total_bytes: None,
        }
    }

    /// Reject sessions that declare more than `max_total_bytes`.
    pub fn with_max_total_bytes(mut self, max_total_bytes: u64) -> Self {
        self.max_total_bytes = Some(max_total_bytes);
        self
    }

    #[tracing::instrument(skip(self), fields(upload.session_id = %session_id))]
    pub fn create_session(
        &self,
        session_id: &str,
        filename: &str,
        total_bytes: u64,
    ) -> Result<UploadSessionSnapshot, AppError> {
        if session_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "session_id must not be empty".to_string(),
            ));
        }
        if filename.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "filename must not be empty".to_string(),
            ));
        }
        if total_bytes == 0 {
            return Err(AppError::InvalidInput(
                "total_bytes must be greater than 0".to_string(),
            ));
        }
        if let Some(max) = self.max_total_bytes {
            if total_bytes > max {
                return Err(AppError::PayloadTooLarge(format!(
                    "Upload of {} bytes exceeds the maximum of {} bytes",
                    total_bytes, max
                )));
            }
        }

        let now = self.clock.now();
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Upload session already exists: {}",
                session_id
            ))),
            Entry::Vacant(vacant) => {
                let session = vacant.insert(UploadSession {
                    session_id: session_id.to_string(),
                    filename: filename.to_string(),
                    total_bytes,
                    uploaded_bytes: 0,
                    status: UploadStatus::Active,
                    chunks: Vec::new(),
                    created_at: now,
                    last_activity: now,
                    error_message: None,
                    finalizing: false,
                });
                tracing::info!(filename = %filename, total_bytes, "Upload session created");
                Ok(session.snapshot())
            }
        }
    }

    /// Append one chunk. The session entry stays locked for the whole update.
    #[tracing::instrument(skip(self, chunk), fields(upload.session_id = %session_id, chunk_bytes = chunk.len()))]
    pub fn accept_chunk(&self, session_id: &str, chunk: Bytes) -> Result<UploadProgress, AppError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;
        let now = self.clock.now();

        if session.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Upload session {} is {} and no longer accepts chunks",
                session_id, session.status
            )));
        }

        if chunk.is_empty() {
            session.last_activity = now;
            return Ok(session.progress());
        }

        let chunk_len = chunk.len() as u64;
        let attempted = session.uploaded_bytes.saturating_add(chunk_len);
        if attempted > session.total_bytes {
            let message = format!(
                "Chunk of {} bytes would bring upload to {} bytes, exceeding declared size of {} bytes",
                chunk_len, attempted, session.total_bytes
            );
            session.fail(message.clone(), now);
            tracing::warn!(
                uploaded_bytes = session.uploaded_bytes,
                total_bytes = session.total_bytes,
                "Upload session overflowed declared size"
            );
            return Err(AppError::InvalidInput(message));
        }

        session.chunks.push(chunk);
        session.uploaded_bytes = attempted;
        session.last_activity = now;

        if session.uploaded_bytes >= session.total_bytes {
            session.status = UploadStatus::Completed;
            tracing::info!(
                total_bytes = session.total_bytes,
                chunks = session.chunks.len(),
                "Upload session completed"
            );
        }

        Ok(session.progress())
    }

    pub fn get_progress(&self, session_id: &str) -> Result<UploadProgress, AppError> {
        self.sessions
            .get(session_id)
            .map(|session| session.progress())
            .ok_or_else(|| not_found(session_id))
    }

    pub fn get_snapshot(&self, session_id: &str) -> Result<UploadSessionSnapshot, AppError> {
        self.sessions
            .get(session_id)
            .map(|session| session.snapshot())
            .ok_or_else(|| not_found(session_id))
    }

    #[tracing::instrument(skip(self), fields(upload.session_id = %session_id))]
    pub fn cancel(&self, session_id: &str) -> Result<UploadProgress, AppError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;

        if session.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Upload session {} is already {}",
                session_id, session.status
            )));
        }

        session.status = UploadStatus::Cancelled;
        session.last_activity = self.clock.now();
        tracing::info!(uploaded_bytes = session.uploaded_bytes, "Upload session cancelled");
        Ok(session.progress())
    }

    /// Move a session to `error`. Completed sessions may also fail here when
    /// persisting them did not succeed.
    #[tracing::instrument(skip(self), fields(upload.session_id = %session_id))]
    pub fn mark_error(&self, session_id: &str, message: &str) -> Result<UploadProgress, AppError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;

        if matches!(
            session.status,
            UploadStatus::Cancelled | UploadStatus::Error
        ) {
            return Err(AppError::Conflict(format!(
                "Upload session {} is already {}",
                session_id, session.status
            )));
        }

        session.fail(message.to_string(), self.clock.now());
        Ok(session.progress())
    }

    /// Claim a completed session for persistence and return its bytes.
    ///
    /// The session stays tracked, and is skipped by sweeps, until
    /// `take_completed` or `mark_error`. A second claim fails with Conflict.
    #[tracing::instrument(skip(self), fields(upload.session_id = %session_id))]
    pub fn begin_finalize(&self, session_id: &str) -> Result<AssembledUpload, AppError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;

        if session.status != UploadStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Upload session {} is {}, not completed",
                session_id, session.status
            )));
        }
        if session.finalizing {
            return Err(AppError::Conflict(format!(
                "Upload session {} is already being finalized",
                session_id
            )));
        }

        session.finalizing = true;
        Ok(assemble(&session))
    }

    /// Remove a completed session and hand back its bytes.
    #[tracing::instrument(skip(self), fields(upload.session_id = %session_id))]
    pub fn take_completed(&self, session_id: &str) -> Result<AssembledUpload, AppError> {
        match self
            .sessions
            .remove_if(session_id, |_, session| session.status == UploadStatus::Completed)
        {
            Some((_, session)) => Ok(assemble(&session)),
            None => match self.sessions.get(session_id) {
                Some(session) => Err(AppError::Conflict(format!(
                    "Upload session {} is {}, not completed",
                    session_id, session.status
                ))),
                None => Err(not_found(session_id)),
            },
        }
    }

    /// Delete every session idle for longer than `max_age`, whatever its status.
    /// Sessions being finalized are left alone.
    #[tracing::instrument(skip(self))]
    pub fn sweep_expired(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut removed = 0usize;
        self.sessions.retain(|_, session| {
            let keep = session.finalizing || session.last_activity >= cutoff;
            if !keep {
                removed += 1;
                tracing::debug!(
                    upload.session_id = %session.session_id,
                    status = %session.status,
                    "Sweeping idle upload session"
                );
            }
            keep
        });

        if removed > 0 {
            tracing::info!(removed, "Swept expired upload sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshots of every tracked session, oldest first.
    pub fn list(&self) -> Vec<UploadSessionSnapshot> {
        let mut snapshots: Vec<UploadSessionSnapshot> =
            self.sessions.iter().map(|entry| entry.snapshot()).collect();
        snapshots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        snapshots
    }
}

fn assemble(session: &UploadSession) -> AssembledUpload {
    let mut data = Vec::with_capacity(session.uploaded_bytes as usize);
    for chunk in &session.chunks {
        data.extend_from_slice(chunk);
    }
    AssembledUpload {
        session_id: session.session_id.clone(),
        filename: session.filename.clone(),
        data,
    }
}

fn not_found(session_id: &str) -> AppError {
    AppError::NotFound(format!("Upload session not found: {}", session_id))
}
