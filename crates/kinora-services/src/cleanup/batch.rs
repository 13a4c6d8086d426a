//! Batched, sequential processing of detected items.

use kinora_core::AppError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub cleaned: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Run `handle` over `items` in batches of `batch_size`.
///
/// Items are handled one after another. `Ok(true)` counts as cleaned, `Ok(false)`
/// as skipped and `Err` as failed; an error never stops the remaining items.
pub async fn process_in_batches<T, F, Fut>(
    items: Vec<T>,
    settings: BatchSettings,
    mut handle: F,
) -> BatchOutcome
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<bool, AppError>>,
{
    let mut outcome = BatchOutcome::default();
    let batch_size = settings.batch_size.max(1);
    let total = items.len();
    let mut items = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while items.peek().is_some() {
        if batch_index > 0 && !settings.batch_delay.is_zero() {
            tokio::time::sleep(settings.batch_delay).await;
        }

        for item in items.by_ref().take(batch_size) {
            match handle(item).await {
                Ok(true) => outcome.cleaned += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    tracing::warn!(error = %e, batch = batch_index, "Cleanup item failed");
                    outcome.failed += 1;
                }
            }
        }

        batch_index += 1;
    }

    tracing::debug!(
        total,
        batches = batch_index,
        cleaned = outcome.cleaned,
        failed = outcome.failed,
        skipped = outcome.skipped,
        "Batch processing finished"
    );

    outcome
}
