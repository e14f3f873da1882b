//! Restored posts and their archive bookkeeping.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use clio_core::{Error, Result};

/// Row of `posts` written for one archive entry.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub body: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Also used as `bumped_at`.
    pub updated_at: DateTime<Utc>,
    pub comments_disabled: bool,
    pub destination_feed_id: i32,
}

pub struct PgPostRepository {
    pool: Pool<Postgres>,
}

impl PgPostRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// True if an entry with this archive name was already restored.
    pub async fn is_imported(&self, old_post_name: &str) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM archive_post_names WHERE old_post_name = $1)",
        )
        .bind(old_post_name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Id of the post restored from an archive entry.
    pub async fn find_by_old_name(&self, old_post_name: &str) -> Result<Option<Uuid>> {
        sqlx::query_scalar("SELECT post_id FROM archive_post_names WHERE old_post_name = $1")
            .bind(old_post_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    pub async fn insert_tx(&self, tx: &mut Transaction<'_, Postgres>, post: &NewPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                uid, body, user_id, created_at, updated_at, bumped_at,
                comments_disabled, destination_feed_ids
            )
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
            "#,
        )
        .bind(post.id)
        .bind(&post.body)
        .bind(post.user_id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.comments_disabled)
        .bind(vec![post.destination_feed_id])
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Record which archive entry the post was restored from.
    pub async fn register_name_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        old_post_name: &str,
        old_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO archive_post_names (post_id, old_post_name, old_url) VALUES ($1, $2, $3)",
        )
        .bind(post_id)
        .bind(old_post_name)
        .bind(old_url)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn register_via_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        via_id: i32,
    ) -> Result<()> {
        sqlx::query("INSERT INTO archive_posts_via (via_id, post_id) VALUES ($1, $2)")
            .bind(via_id)
            .bind(post_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// River of News feeds of all users subscribed to any of `feed_uids`.
    pub async fn subscriber_rivers_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        feed_uids: &[Uuid],
    ) -> Result<Vec<i32>> {
        let ids: Option<Vec<i32>> = sqlx::query_scalar(
            r#"
            SELECT array_agg(DISTINCT f.id)
            FROM subscriptions s
            JOIN feeds f ON f.user_id = s.user_id AND f.name = 'RiverOfNews'
            WHERE s.feed_id = ANY($1)
            "#,
        )
        .bind(feed_uids)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(ids.unwrap_or_default())
    }

    /// Overwrite the set of feeds the post is visible in.
    pub async fn set_feed_ids_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        feed_ids: &[i32],
    ) -> Result<()> {
        sqlx::query("UPDATE posts SET feed_ids = $1 WHERE uid = $2")
            .bind(feed_ids)
            .bind(post_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Sorted feed ids of a post.
    pub async fn feed_ids(&self, post_id: Uuid) -> Result<Vec<i32>> {
        let mut ids: Vec<i32> = sqlx::query_scalar("SELECT feed_ids FROM posts WHERE uid = $1")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("post {}", post_id)))?;
        ids.sort_unstable();
        Ok(ids)
    }
}
