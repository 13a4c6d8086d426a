//! Kinora Core Library
//!
//! This crate provides the error types, configuration, clock abstraction and
//! domain models shared by every Kinora component.

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BaseConfig, CleanupConfig, Config, CronCadenceConfig, StorageConfig, UploadConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
