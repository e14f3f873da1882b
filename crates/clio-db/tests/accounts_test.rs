//! Account resolution and archive settings against a live database.

use std::sync::Arc;

use clio_db::test_fixtures::{ArchiveFlags, TestDatabase};

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_resolve_known_account() {
    let test_db = TestDatabase::new().await;
    let alice = test_db
        .create_user(
            "alice",
            ArchiveFlags {
                restore_comments_and_likes: true,
                disable_comments: true,
                ..ArchiveFlags::default()
            },
        )
        .await;

    let acc = test_db.db.accounts.resolve("alice").await.unwrap();
    assert!(acc.exists());
    assert_eq!(acc.user_id, Some(alice.user_id));
    assert_eq!(acc.new_username, "alice-ff");
    assert!(acc.restore_comments_and_likes);
    assert!(acc.disable_comments);
    assert!(!acc.restore_self_comments);
    assert_eq!(acc.feeds, alice.feeds);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_resolve_unknown_account_is_usable() {
    let test_db = TestDatabase::new().await;

    let acc = test_db.db.accounts.resolve("ghost").await.unwrap();
    assert!(!acc.exists());
    assert_eq!(acc.old_username, "ghost");
    assert_eq!(acc.feeds.posts.id, 0);
    assert!(!acc.restore_comments_and_likes);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_resolve_is_cached_per_run() {
    let test_db = TestDatabase::new().await;
    test_db.create_user("alice", ArchiveFlags::default()).await;

    let first = test_db.db.accounts.resolve("alice").await.unwrap();
    sqlx::query("UPDATE archives SET restore_comments_and_likes = true")
        .execute(&test_db.pool)
        .await
        .unwrap();
    let second = test_db.db.accounts.resolve("alice").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!second.restore_comments_and_likes);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_recovery_status_and_via_settings() {
    let test_db = TestDatabase::new().await;
    let alice = test_db
        .create_user(
            "alice",
            ArchiveFlags {
                recovery_status: 1,
                ..ArchiveFlags::default()
            },
        )
        .await;
    sqlx::query(
        r#"
        UPDATE archives SET
            via_sources = '[{"url": "http://friendfeed.com", "name": "FriendFeed", "count": 4},
                            {"url": "http://www.zooomr.com/", "name": "Zooomr", "count": 2}]',
            via_restore = '{http://friendfeed.com}'
        WHERE user_id = $1
        "#,
    )
    .bind(alice.user_id)
    .execute(&test_db.pool)
    .await
    .unwrap();

    let archives = &test_db.db.archives;
    assert_eq!(archives.recovery_status(alice.user_id).await.unwrap(), 1);

    let settings = archives.via_settings("alice").await.unwrap();
    assert_eq!(settings.total_entries(), 6);
    assert_eq!(settings.entries_to_restore(), 4);
    assert!(settings.allows("http://friendfeed.com"));

    archives.set_recovery_status(alice.user_id, 2).await.unwrap();
    assert_eq!(archives.recovery_status(alice.user_id).await.unwrap(), 2);

    test_db.cleanup().await;
}
