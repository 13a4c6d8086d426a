//! Orphan file tracking rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "orphan_cleanup_status", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrphanCleanupStatus {
    Pending,
    Cleaned,
    Failed,
}

/// A storage object with no referencing media row.
///
/// `created_at` is the first time the object was seen unreferenced and is never
/// refreshed; `last_checked_at` moves on every detection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrphanFile {
    pub id: Uuid,
    pub storage_key: String,
    pub file_size: i64,
    pub last_modified: DateTime<Utc>,
    pub cleanup_status: OrphanCleanupStatus,
    pub created_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub cleaned_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl OrphanFile {
    /// Seen unreferenced in the pass at `checked_at` and first recorded at
    /// least `confirmation_window` earlier.
    pub fn is_confirmed_orphan(
        &self,
        checked_at: DateTime<Utc>,
        confirmation_window: chrono::Duration,
    ) -> bool {
        self.cleanup_status == OrphanCleanupStatus::Pending
            && self.last_checked_at >= checked_at
            && checked_at - self.created_at >= confirmation_window
    }
}

/// Detection input for one unreferenced storage object.
#[derive(Debug, Clone)]
pub struct OrphanUpsert {
    pub storage_key: String,
    pub file_size: i64,
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn orphan(created_at: DateTime<Utc>, last_checked_at: DateTime<Utc>) -> OrphanFile {
        OrphanFile {
            id: Uuid::new_v4(),
            storage_key: "uploads/foo.jpg".to_string(),
            file_size: 10,
            last_modified: created_at,
            cleanup_status: OrphanCleanupStatus::Pending,
            created_at,
            last_checked_at,
            cleaned_at: None,
            error_message: None,
        }
    }

    #[test]
    fn test_not_confirmed_on_first_detection() {
        let now = Utc::now();
        let row = orphan(now, now);
        assert!(!row.is_confirmed_orphan(now, Duration::days(7)));
    }

    #[test]
    fn test_confirmed_after_window() {
        let first = Utc::now();
        let second = first + Duration::days(8);
        let row = orphan(first, second);
        assert!(row.is_confirmed_orphan(second, Duration::days(7)));
    }

    #[test]
    fn test_not_confirmed_when_not_seen_this_pass() {
        let first = Utc::now();
        let second = first + Duration::days(8);
        let row = orphan(first, first);
        assert!(!row.is_confirmed_orphan(second, Duration::days(7)));
    }
}
