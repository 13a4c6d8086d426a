//! Kinora Services Layer
//!
//! The two stateful components of the platform live here: the in-process
//! upload session tracker and the cron-driven cleanup scheduler with its
//! maintenance tasks. The API crate wires them to HTTP; keep business logic
//! and coordination here.

pub mod cleanup;
pub mod upload;

pub use cleanup::{
    BatchSettings, CleanupScheduler, CleanupTask, ExpiredTransactionCleaner,
    IncompleteUploadCleaner, OrphanCleanupSettings, OrphanFileCleaner, TempFileCleaner,
};
pub use kinora_storage::{create_storage, Storage, StorageBackend, StorageError, StorageResult};
pub use upload::UploadSessionStore;
