//! Transactions repository: expiry sweep over the `transactions` table.

use chrono::{DateTime, Utc};
use kinora_core::models::TransactionStatus;
use kinora_core::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait TransactionStore: Send + Sync {
    /// Ids of `PENDING` transactions whose `expires_at` is before `now`, oldest first.
    async fn find_expired(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>, AppError>;

    /// Move one transaction to `EXPIRED`. Returns false when the row was no longer pending.
    async fn mark_expired(&self, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TransactionStore for TransactionRepository {
    #[tracing::instrument(skip(self), fields(db.table = "transactions"))]
    async fn find_expired(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>, AppError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM transactions
            WHERE status = $1 AND expires_at < $2
            ORDER BY expires_at ASC
            LIMIT $3
            "#,
        )
        .bind(TransactionStatus::Pending)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(db.table = "transactions", db.record_id = %id))]
    async fn mark_expired(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(TransactionStatus::Expired)
        .bind(TransactionStatus::Pending)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
