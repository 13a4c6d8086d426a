//! Chunked upload tracking.

pub mod sessions;

pub use sessions::UploadSessionStore;
