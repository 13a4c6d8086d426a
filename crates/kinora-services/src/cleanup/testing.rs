//! In-memory doubles for the repository and storage traits used by cleanup tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kinora_core::models::{OrphanCleanupStatus, OrphanFile, OrphanUpsert, TransactionStatus};
use kinora_core::AppError;
use kinora_db::{MediaReferenceSource, OrphanFileStore, TransactionStore};
use kinora_storage::{Storage, StorageBackend, StorageError, StorageObject, StorageResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryOrphanStore {
    pub rows: Mutex<HashMap<String, OrphanFile>>,
}

impl InMemoryOrphanStore {
    pub fn row(&self, storage_key: &str) -> Option<OrphanFile> {
        self.rows.lock().unwrap().get(storage_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl OrphanFileStore for InMemoryOrphanStore {
    async fn upsert_detected(
        &self,
        candidates: &[OrphanUpsert],
        checked_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        for candidate in candidates {
            match rows.get_mut(&candidate.storage_key) {
                Some(row) => {
                    if row.cleanup_status == OrphanCleanupStatus::Cleaned {
                        row.created_at = checked_at;
                        row.cleaned_at = None;
                    }
                    row.file_size = candidate.file_size;
                    row.last_modified = candidate.last_modified;
                    row.last_checked_at = checked_at;
                    row.error_message = None;
                    row.cleanup_status = OrphanCleanupStatus::Pending;
                }
                None => {
                    rows.insert(
                        candidate.storage_key.clone(),
                        OrphanFile {
                            id: Uuid::new_v4(),
                            storage_key: candidate.storage_key.clone(),
                            file_size: candidate.file_size,
                            last_modified: candidate.last_modified,
                            cleanup_status: OrphanCleanupStatus::Pending,
                            created_at: checked_at,
                            last_checked_at: checked_at,
                            cleaned_at: None,
                            error_message: None,
                        },
                    );
                }
            }
        }
        Ok(candidates.len() as u64)
    }

    async fn remove_stale_pending(&self, checked_at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, row| {
            !(row.cleanup_status == OrphanCleanupStatus::Pending && row.last_checked_at < checked_at)
        });
        Ok((before - rows.len()) as u64)
    }

    async fn list_confirmed(
        &self,
        checked_at: DateTime<Utc>,
        confirmed_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrphanFile>, AppError> {
        let rows = self.rows.lock().unwrap();
        let mut confirmed: Vec<OrphanFile> = rows
            .values()
            .filter(|row| row.is_confirmed_orphan(checked_at, checked_at - confirmed_before))
            .cloned()
            .collect();
        confirmed.sort_by(|a, b| a.storage_key.cmp(&b.storage_key));
        confirmed.truncate(limit.max(0) as usize);
        Ok(confirmed)
    }

    async fn mark_cleaned(&self, id: Uuid, cleaned_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.values_mut().find(|row| row.id == id) {
            row.cleanup_status = OrphanCleanupStatus::Cleaned;
            row.cleaned_at = Some(cleaned_at);
            row.error_message = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), AppError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.values_mut().find(|row| row.id == id) {
            row.cleanup_status = OrphanCleanupStatus::Failed;
            row.error_message = Some(error_message.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticReferences {
    pub keys: Mutex<HashSet<String>>,
    pub fail: bool,
}

impl StaticReferences {
    pub fn add(&self, key: &str) {
        self.keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl MediaReferenceSource for StaticReferences {
    async fn referenced_keys(&self, keys: &[String]) -> Result<HashSet<String>, AppError> {
        if self.fail {
            return Err(AppError::Internal("media table unavailable".to_string()));
        }
        let referenced = self.keys.lock().unwrap();
        Ok(keys
            .iter()
            .filter(|key| referenced.contains(*key))
            .cloned()
            .collect())
    }
}

/// Object store double with per-key delete failures.
#[derive(Default)]
pub struct FlakyStorage {
    pub objects: Mutex<BTreeMap<String, StorageObject>>,
    pub failing_deletes: Mutex<HashSet<String>>,
    pub fail_list: bool,
}

impl FlakyStorage {
    pub fn put(&self, key: &str, size: u64, last_modified: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StorageObject {
                key: key.to_string(),
                size,
                last_modified,
            },
        );
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.put(storage_key, data.len() as u64, Utc::now());
        Ok(format!("memory://{}", storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        if self.failing_deletes.lock().unwrap().contains(storage_key) {
            return Err(StorageError::DeleteFailed(format!(
                "access denied: {}",
                storage_key
            )));
        }
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.contains(storage_key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<StorageObject>> {
        if self.fail_list {
            return Err(StorageError::ListFailed("bucket unreachable".to_string()));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|object| object.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("memory://{}", storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[derive(Default)]
pub struct InMemoryTransactions {
    pub rows: Mutex<HashMap<Uuid, (TransactionStatus, DateTime<Utc>)>>,
    pub failing: Mutex<HashSet<Uuid>>,
    pub fail_find: bool,
}

impl InMemoryTransactions {
    pub fn insert(&self, status: TransactionStatus, expires_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.lock().unwrap().insert(id, (status, expires_at));
        id
    }

    pub fn fail_update_of(&self, id: Uuid) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn status(&self, id: Uuid) -> Option<TransactionStatus> {
        self.rows.lock().unwrap().get(&id).map(|(status, _)| *status)
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactions {
    async fn find_expired(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>, AppError> {
        if self.fail_find {
            return Err(AppError::Internal("transactions table unavailable".to_string()));
        }
        let rows = self.rows.lock().unwrap();
        let mut expired: Vec<(DateTime<Utc>, Uuid)> = rows
            .iter()
            .filter(|(_, (status, expires_at))| {
                *status == TransactionStatus::Pending && *expires_at < now
            })
            .map(|(id, (_, expires_at))| (*expires_at, *id))
            .collect();
        expired.sort();
        Ok(expired
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn mark_expired(&self, id: Uuid) -> Result<bool, AppError> {
        if self.failing.lock().unwrap().contains(&id) {
            return Err(AppError::Internal(format!("update of {} timed out", id)));
        }
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some((status, _)) if *status == TransactionStatus::Pending => {
                *status = TransactionStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
