//! Cleanup scheduling and maintenance tasks.

pub mod batch;
pub mod expired_transactions;
pub mod incomplete_uploads;
pub mod orphan_files;
pub mod scheduler;
pub mod task;
pub mod temp_files;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchOutcome, BatchSettings};
pub use expired_transactions::ExpiredTransactionCleaner;
pub use incomplete_uploads::IncompleteUploadCleaner;
pub use orphan_files::{OrphanCleanupSettings, OrphanFileCleaner};
pub use scheduler::CleanupScheduler;
pub use task::CleanupTask;
pub use temp_files::TempFileCleaner;
