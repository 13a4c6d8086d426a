//! Kinora Storage Library
//!
//! Storage abstraction for Kinora with S3 and local filesystem backends.
//!
//! # Storage key format
//!
//! Finalized uploads are stored under `uploads/{session_id}/{filename}`. The orphan
//! scanner lists this prefix, so every backend must use the same layout.
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{upload_key, validate_key, UPLOADS_PREFIX};
pub use kinora_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageObject, StorageResult};
