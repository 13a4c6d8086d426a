//! Database transaction utilities
//!
//! Multi-row writes (the orphan upsert pass) go through [`TransactionGuard`] so a
//! detection pass is recorded atomically or not at all.

use kinora_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};
use std::ops::{Deref, DerefMut};

/// A database transaction wrapper with explicit commit/rollback.
///
/// # Example
///
/// ```ignore
/// use kinora_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), kinora_core::AppError> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     sqlx::query("UPDATE orphan_files SET ...").execute(&mut **tx).await?;
///     tx.commit().await?;
///     Ok(())
/// }
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new database transaction
    pub async fn begin(pool: &'a PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin database transaction");
            AppError::Database(e)
        })?;

        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Commit the transaction. Consumes the guard.
    pub async fn commit(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    /// Roll the transaction back. Consumes the guard.
    pub async fn rollback(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        self.transaction
            .as_ref()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.transaction
            .as_mut()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> Drop for TransactionGuard<'a> {
    fn drop(&mut self) {
        // sqlx rolls back a dropped transaction when its connection returns to the pool
        if self.transaction.is_some() {
            tracing::warn!("Transaction dropped without explicit commit or rollback");
        }
    }
}
