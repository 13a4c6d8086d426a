use async_trait::async_trait;
use kinora_core::models::{CleanupReport, CleanupTaskType};
use kinora_core::{AppError, Clock};
use kinora_db::TransactionStore;
use std::sync::Arc;
use uuid::Uuid;

use super::batch::{process_in_batches, BatchSettings};
use super::task::CleanupTask;

/// Marks `PENDING` transactions past their `expires_at` as `EXPIRED`.
pub struct ExpiredTransactionCleaner {
    transactions: Arc<dyn TransactionStore>,
    clock: Arc<dyn Clock>,
    max_items: i64,
    batch: BatchSettings,
}

impl ExpiredTransactionCleaner {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        clock: Arc<dyn Clock>,
        max_items: i64,
        batch: BatchSettings,
    ) -> Self {
        Self {
            transactions,
            clock,
            max_items,
            batch,
        }
    }

    async fn expire(&self, id: Uuid) -> Result<bool, AppError> {
        let expired = self.transactions.mark_expired(id).await?;
        if !expired {
            tracing::debug!(transaction_id = %id, "Transaction left pending state before expiry");
        }
        Ok(expired)
    }
}

#[async_trait]
impl CleanupTask for ExpiredTransactionCleaner {
    fn task_type(&self) -> CleanupTaskType {
        CleanupTaskType::ExpiredTransactions
    }

    #[tracing::instrument(skip(self), fields(cleanup.task = "expired_transactions"))]
    async fn run(&self) -> Result<CleanupReport, AppError> {
        let started = std::time::Instant::now();
        let now = self.clock.now();

        let expired = self.transactions.find_expired(now, self.max_items).await?;
        let detected = expired.len() as u64;
        tracing::info!(detected, "Expired transactions detected");

        let outcome = process_in_batches(expired, self.batch, |id| self.expire(id)).await;

        Ok(CleanupReport {
            task_type: self.task_type(),
            detected,
            cleaned: outcome.cleaned,
            failed: outcome.failed,
            skipped: outcome.skipped,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::testing::InMemoryTransactions;
    use chrono::{Duration, TimeZone, Utc};
    use kinora_core::models::TransactionStatus;
    use kinora_core::ManualClock;

    fn cleaner(transactions: Arc<InMemoryTransactions>, clock: Arc<ManualClock>) -> ExpiredTransactionCleaner {
        ExpiredTransactionCleaner::new(
            transactions,
            clock,
            1000,
            BatchSettings {
                batch_size: 2,
                batch_delay: std::time::Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_marks_only_expired_pending_rows() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 2, 0, 0).unwrap(),
        ));
        let now = clock.now();
        let transactions = Arc::new(InMemoryTransactions::default());
        let expired_a = transactions.insert(TransactionStatus::Pending, now - Duration::hours(1));
        let expired_b = transactions.insert(TransactionStatus::Pending, now - Duration::days(3));
        let still_valid = transactions.insert(TransactionStatus::Pending, now + Duration::hours(1));
        let completed = transactions.insert(TransactionStatus::Completed, now - Duration::days(1));

        let report = cleaner(transactions.clone(), clock).run().await.unwrap();

        assert_eq!(report.detected, 2);
        assert_eq!(report.cleaned, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(transactions.status(expired_a), Some(TransactionStatus::Expired));
        assert_eq!(transactions.status(expired_b), Some(TransactionStatus::Expired));
        assert_eq!(transactions.status(still_valid), Some(TransactionStatus::Pending));
        assert_eq!(transactions.status(completed), Some(TransactionStatus::Completed));
    }

    #[tokio::test]
    async fn test_failed_update_is_counted() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let now = clock.now();
        let transactions = Arc::new(InMemoryTransactions::default());
        let ok = transactions.insert(TransactionStatus::Pending, now - Duration::hours(2));
        let broken = transactions.insert(TransactionStatus::Pending, now - Duration::hours(1));
        transactions.fail_update_of(broken);

        let report = cleaner(transactions.clone(), clock).run().await.unwrap();

        assert_eq!(report.cleaned, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(transactions.status(ok), Some(TransactionStatus::Expired));
        assert_eq!(transactions.status(broken), Some(TransactionStatus::Pending));
    }

    #[tokio::test]
    async fn test_detect_failure_aborts_run() {
        let transactions = Arc::new(InMemoryTransactions {
            fail_find: true,
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        assert!(cleaner(transactions, clock).run().await.is_err());
    }
}
