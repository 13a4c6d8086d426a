//! Postgres repository tests.
//!
//! Requires Docker for testcontainers (Postgres).
//! Run with: `cargo test -p kinora-db --test repositories_test`

mod helpers;

use chrono::Duration;
use helpers::{at, orphan_row, setup_test_db};
use kinora_core::models::{OrphanCleanupStatus, OrphanUpsert, TransactionStatus};
use kinora_db::{
    MediaReferenceRepository, MediaReferenceSource, OrphanFileRepository, OrphanFileStore,
    TransactionRepository, TransactionStore,
};
use uuid::Uuid;

fn candidate(storage_key: &str, file_size: i64) -> OrphanUpsert {
    OrphanUpsert {
        storage_key: storage_key.to_string(),
        file_size,
        last_modified: at(1, 0),
    }
}

#[tokio::test]
async fn test_upsert_keeps_first_seen_time() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let repo = OrphanFileRepository::new(db.pool.clone());

    repo.upsert_detected(&[candidate("uploads/a.bin", 10)], at(1, 3))
        .await
        .unwrap();
    let first = orphan_row(&db.pool, "uploads/a.bin").await.unwrap();
    assert_eq!(first.cleanup_status, OrphanCleanupStatus::Pending);
    assert_eq!(first.created_at, at(1, 3));
    assert_eq!(first.last_checked_at, at(1, 3));

    repo.upsert_detected(&[candidate("uploads/a.bin", 20)], at(8, 3))
        .await
        .unwrap();
    let second = orphan_row(&db.pool, "uploads/a.bin").await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, at(1, 3));
    assert_eq!(second.last_checked_at, at(8, 3));
    assert_eq!(second.file_size, 20);
}

#[tokio::test]
async fn test_upsert_requeues_failed_row() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let repo = OrphanFileRepository::new(db.pool.clone());

    repo.upsert_detected(&[candidate("uploads/stuck.bin", 1)], at(1, 3))
        .await
        .unwrap();
    let row = orphan_row(&db.pool, "uploads/stuck.bin").await.unwrap();
    repo.mark_failed(row.id, "access denied").await.unwrap();

    let failed = orphan_row(&db.pool, "uploads/stuck.bin").await.unwrap();
    assert_eq!(failed.cleanup_status, OrphanCleanupStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("access denied"));

    repo.upsert_detected(&[candidate("uploads/stuck.bin", 1)], at(9, 3))
        .await
        .unwrap();
    let retried = orphan_row(&db.pool, "uploads/stuck.bin").await.unwrap();
    assert_eq!(retried.cleanup_status, OrphanCleanupStatus::Pending);
    assert_eq!(retried.created_at, at(1, 3));
    assert_eq!(retried.error_message, None);
}

#[tokio::test]
async fn test_upsert_restarts_cleaned_row() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let repo = OrphanFileRepository::new(db.pool.clone());

    repo.upsert_detected(&[candidate("uploads/again.bin", 5)], at(1, 3))
        .await
        .unwrap();
    let row = orphan_row(&db.pool, "uploads/again.bin").await.unwrap();
    repo.mark_cleaned(row.id, at(8, 3)).await.unwrap();

    let cleaned = orphan_row(&db.pool, "uploads/again.bin").await.unwrap();
    assert_eq!(cleaned.cleanup_status, OrphanCleanupStatus::Cleaned);
    assert_eq!(cleaned.cleaned_at, Some(at(8, 3)));

    // The same key showed up in storage again
    repo.upsert_detected(&[candidate("uploads/again.bin", 5)], at(15, 3))
        .await
        .unwrap();
    let restarted = orphan_row(&db.pool, "uploads/again.bin").await.unwrap();
    assert_eq!(restarted.cleanup_status, OrphanCleanupStatus::Pending);
    assert_eq!(restarted.created_at, at(15, 3));
    assert_eq!(restarted.cleaned_at, None);
}

#[tokio::test]
async fn test_remove_stale_pending_only_drops_unseen_pending_rows() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let repo = OrphanFileRepository::new(db.pool.clone());

    repo.upsert_detected(
        &[
            candidate("uploads/seen.bin", 1),
            candidate("uploads/gone.bin", 1),
            candidate("uploads/failed.bin", 1),
        ],
        at(1, 3),
    )
    .await
    .unwrap();
    let failed = orphan_row(&db.pool, "uploads/failed.bin").await.unwrap();
    repo.mark_failed(failed.id, "timeout").await.unwrap();

    repo.upsert_detected(&[candidate("uploads/seen.bin", 1)], at(2, 3))
        .await
        .unwrap();
    let removed = repo.remove_stale_pending(at(2, 3)).await.unwrap();

    assert_eq!(removed, 1);
    assert!(orphan_row(&db.pool, "uploads/gone.bin").await.is_none());
    assert!(orphan_row(&db.pool, "uploads/seen.bin").await.is_some());
    assert!(orphan_row(&db.pool, "uploads/failed.bin").await.is_some());
}

#[tokio::test]
async fn test_list_confirmed_applies_window_and_pass() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let repo = OrphanFileRepository::new(db.pool.clone());

    repo.upsert_detected(
        &[candidate("uploads/old.bin", 1), candidate("uploads/unseen.bin", 1)],
        at(1, 3),
    )
    .await
    .unwrap();
    repo.upsert_detected(&[candidate("uploads/young.bin", 1)], at(5, 3))
        .await
        .unwrap();

    let checked_at = at(9, 3);
    repo.upsert_detected(
        &[candidate("uploads/old.bin", 1), candidate("uploads/young.bin", 1)],
        checked_at,
    )
    .await
    .unwrap();

    let confirmed = repo
        .list_confirmed(checked_at, checked_at - Duration::days(7), 100)
        .await
        .unwrap();
    let keys: Vec<&str> = confirmed.iter().map(|row| row.storage_key.as_str()).collect();
    assert_eq!(keys, vec!["uploads/old.bin"]);

    let limited = repo
        .list_confirmed(checked_at, checked_at, 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].storage_key, "uploads/old.bin");
}

#[tokio::test]
async fn test_referenced_keys_returns_known_subset() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    sqlx::query("INSERT INTO media (id, storage_key, filename) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind("uploads/s1/clip.mp4")
        .bind("clip.mp4")
        .execute(&db.pool)
        .await
        .unwrap();

    let repo = MediaReferenceRepository::new(db.pool.clone());
    let referenced = repo
        .referenced_keys(&[
            "uploads/s1/clip.mp4".to_string(),
            "uploads/s2/other.mp4".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(referenced.len(), 1);
    assert!(referenced.contains("uploads/s1/clip.mp4"));
    assert!(repo.referenced_keys(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_pending_transactions_are_marked() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let now = at(10, 12);

    let expired = Uuid::new_v4();
    let live = Uuid::new_v4();
    let settled = Uuid::new_v4();
    for (id, status, expires_at) in [
        (expired, TransactionStatus::Pending, now - Duration::hours(1)),
        (live, TransactionStatus::Pending, now + Duration::hours(1)),
        (settled, TransactionStatus::Completed, now - Duration::hours(1)),
    ] {
        sqlx::query(
            "INSERT INTO transactions (id, amount_cents, status, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(1999_i64)
        .bind(status)
        .bind(expires_at)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    let repo = TransactionRepository::new(db.pool.clone());
    assert_eq!(repo.find_expired(now, 10).await.unwrap(), vec![expired]);

    assert!(repo.mark_expired(expired).await.unwrap());
    // Already moved on
    assert!(!repo.mark_expired(expired).await.unwrap());
    assert!(!repo.mark_expired(settled).await.unwrap());

    let status: TransactionStatus =
        sqlx::query_scalar("SELECT status FROM transactions WHERE id = $1")
            .bind(expired)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(status, TransactionStatus::Expired);
    assert!(repo.find_expired(now, 10).await.unwrap().is_empty());
}
