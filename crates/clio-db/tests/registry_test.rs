//! Via-source and hashtag registries against a live database.

use clio_core::ViaSource;
use clio_db::test_fixtures::TestDatabase;

fn via(url: &str, name: &str) -> ViaSource {
    ViaSource {
        url: url.to_string(),
        name: name.to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_direct_post_via_is_zero_without_writes() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let mut tx = db.begin().await.unwrap();
    let id = db.via.id_for_tx(&mut tx, &ViaSource::direct()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(id, 0);
    assert_eq!(db.via.count().await.unwrap(), 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_same_via_url_yields_same_id() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let mut tx = db.begin().await.unwrap();
    let first = db
        .via
        .id_for_tx(&mut tx, &via("http://twitter.com/alice", "Twitter"))
        .await
        .unwrap();
    let second = db
        .via
        .id_for_tx(&mut tx, &via("http://twitter.com/alice", "Twitter (renamed)"))
        .await
        .unwrap();
    let other = db
        .via
        .id_for_tx(&mut tx, &via("http://www.flickr.com/", "Flickr"))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    db.commit_caches();

    assert_ne!(first, 0);
    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(db.via.count().await.unwrap(), 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_via_registered_by_another_process_is_reused() {
    let test_db = TestDatabase::new().await;
    let existing: i32 = sqlx::query_scalar(
        "INSERT INTO archive_via (url, title) VALUES ('http://www.flickr.com/', 'Flickr') RETURNING id",
    )
    .fetch_one(&test_db.pool)
    .await
    .unwrap();

    let db = &test_db.db;
    let mut tx = db.begin().await.unwrap();
    let id = db
        .via
        .id_for_tx(&mut tx, &via("http://www.flickr.com/", "Flickr"))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(id, existing);
    assert_eq!(db.via.count().await.unwrap(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_rolled_back_via_is_not_cached() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let source = via("http://www.zooomr.com/", "Zooomr");

    let mut tx = db.begin().await.unwrap();
    let rolled_back = db.via.id_for_tx(&mut tx, &source).await.unwrap();
    tx.rollback().await.unwrap();
    db.discard_caches();

    let mut tx = db.begin().await.unwrap();
    let fresh = db.via.id_for_tx(&mut tx, &source).await.unwrap();
    tx.commit().await.unwrap();

    // serial sequences are not rolled back, so a fresh row has a new id
    assert_ne!(rolled_back, fresh);
    let stored: i32 = sqlx::query_scalar("SELECT id FROM archive_via WHERE url = $1")
        .bind(&source.url)
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(stored, fresh);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable Postgres
async fn test_hashtag_ids_are_case_insensitive() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let mut tx = db.begin().await.unwrap();
    let upper = db.hashtags.id_for_tx(&mut tx, "AbC").await.unwrap();
    let lower = db.hashtags.id_for_tx(&mut tx, "abc").await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(upper, lower);
    assert_eq!(test_db.count("hashtags").await, 1);
    let name: String = sqlx::query_scalar("SELECT name FROM hashtags")
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(name, "abc");

    test_db.cleanup().await;
}
