//! Shared key generation for storage backends.
//!
//! Key format: `uploads/{session_id}/{filename}`.

use crate::traits::{StorageError, StorageResult};

/// Prefix under which finalized uploads are written.
pub const UPLOADS_PREFIX: &str = "uploads/";

/// Build the storage key for a finalized upload session.
///
/// Path separators in the filename are replaced so a client cannot nest objects
/// outside its session directory.
pub fn upload_key(session_id: &str, filename: &str) -> StorageResult<String> {
    let safe_name: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let key = format!("{}{}/{}", UPLOADS_PREFIX, session_id, safe_name);
    validate_key(&key)?;
    Ok(key)
}

/// Reject keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    let bad_segment = storage_key
        .split(['/', '\\'])
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if storage_key.is_empty() || bad_segment {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
