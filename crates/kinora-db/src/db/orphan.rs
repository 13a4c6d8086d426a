//! Orphan file repository: tracking rows for unreferenced storage objects.

use chrono::{DateTime, Utc};
use kinora_core::models::{OrphanFile, OrphanUpsert};
use kinora_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;

/// Persistence for the two-pass orphan confirmation.
///
/// All timestamps are supplied by the caller so a whole detection pass shares
/// one `checked_at` value.
#[async_trait::async_trait]
pub trait OrphanFileStore: Send + Sync {
    /// Record every candidate seen unreferenced in this pass.
    ///
    /// New keys get a `PENDING` row with `created_at = checked_at`. Existing rows
    /// refresh `last_checked_at` only; `FAILED` rows go back to `PENDING`. A
    /// `CLEANED` row whose key reappeared is tracked again from scratch.
    async fn upsert_detected(
        &self,
        candidates: &[OrphanUpsert],
        checked_at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Drop `PENDING` rows not seen unreferenced in this pass.
    async fn remove_stale_pending(&self, checked_at: DateTime<Utc>) -> Result<u64, AppError>;

    /// `PENDING` rows seen in this pass and first seen at or before `confirmed_before`.
    async fn list_confirmed(
        &self,
        checked_at: DateTime<Utc>,
        confirmed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrphanFile>, AppError>;

    async fn mark_cleaned(&self, id: Uuid, cleaned_at: DateTime<Utc>) -> Result<(), AppError>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct OrphanFileRepository {
    pool: PgPool,
}

impl OrphanFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrphanFileStore for OrphanFileRepository {
    #[tracing::instrument(skip(self, candidates), fields(db.table = "orphan_files", count = candidates.len()))]
    async fn upsert_detected(
        &self,
        candidates: &[OrphanUpsert],
        checked_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let mut affected = 0u64;

        for candidate in candidates {
            let result = sqlx::query(
                r#"
                INSERT INTO orphan_files (
                    id, storage_key, file_size, last_modified,
                    cleanup_status, created_at, last_checked_at
                )
                VALUES ($1, $2, $3, $4, 'PENDING', $5, $5)
                ON CONFLICT (storage_key) DO UPDATE SET
                    file_size = EXCLUDED.file_size,
                    last_modified = EXCLUDED.last_modified,
                    last_checked_at = EXCLUDED.last_checked_at,
                    created_at = CASE
                        WHEN orphan_files.cleanup_status = 'CLEANED' THEN EXCLUDED.created_at
                        ELSE orphan_files.created_at
                    END,
                    cleaned_at = CASE
                        WHEN orphan_files.cleanup_status = 'CLEANED' THEN NULL
                        ELSE orphan_files.cleaned_at
                    END,
                    error_message = NULL,
                    cleanup_status = 'PENDING'
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&candidate.storage_key)
            .bind(candidate.file_size)
            .bind(candidate.last_modified)
            .bind(checked_at)
            .execute(&mut **tx)
            .await?;
            affected += result.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }

    #[tracing::instrument(skip(self), fields(db.table = "orphan_files"))]
    async fn remove_stale_pending(&self, checked_at: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM orphan_files
            WHERE cleanup_status = 'PENDING' AND last_checked_at < $1
            "#,
        )
        .bind(checked_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "orphan_files"))]
    async fn list_confirmed(
        &self,
        checked_at: DateTime<Utc>,
        confirmed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrphanFile>, AppError> {
        let rows = sqlx::query_as::<Postgres, OrphanFile>(
            r#"
            SELECT id, storage_key, file_size, last_modified, cleanup_status,
                   created_at, last_checked_at, cleaned_at, error_message
            FROM orphan_files
            WHERE cleanup_status = 'PENDING'
              AND last_checked_at >= $1
              AND created_at <= $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(checked_at)
        .bind(confirmed_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "orphan_files", db.record_id = %id))]
    async fn mark_cleaned(&self, id: Uuid, cleaned_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE orphan_files
            SET cleanup_status = 'CLEANED', cleaned_at = $2, error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(cleaned_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "orphan_files", db.record_id = %id))]
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE orphan_files
            SET cleanup_status = 'FAILED', error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
