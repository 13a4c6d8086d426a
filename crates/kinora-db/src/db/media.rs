//! Read-only access to the storage keys referenced by media rows.

use kinora_core::AppError;
use sqlx::PgPool;
use std::collections::HashSet;

#[async_trait::async_trait]
pub trait MediaReferenceSource: Send + Sync {
    /// Return the subset of `keys` that some media row references.
    async fn referenced_keys(&self, keys: &[String]) -> Result<HashSet<String>, AppError>;
}

#[derive(Clone)]
pub struct MediaReferenceRepository {
    pool: PgPool,
}

impl MediaReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MediaReferenceSource for MediaReferenceRepository {
    #[tracing::instrument(skip(self, keys), fields(db.table = "media", count = keys.len()))]
    async fn referenced_keys(&self, keys: &[String]) -> Result<HashSet<String>, AppError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT storage_key
            FROM media
            WHERE storage_key = ANY($1)
            "#,
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
