pub mod cleanup;
pub mod orphan;
pub mod transaction;
pub mod upload;

pub use cleanup::{
    CleanupEvent, CleanupReport, CleanupTaskType, SchedulerStatus, TaskRunStats,
};
pub use orphan::{OrphanCleanupStatus, OrphanFile, OrphanUpsert};
pub use transaction::TransactionStatus;
pub use upload::{AssembledUpload, UploadProgress, UploadSessionSnapshot, UploadStatus};
