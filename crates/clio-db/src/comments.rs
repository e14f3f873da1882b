//! Comments and likes of restored posts, visible or hidden.
//!
//! Hidden contributions keep a placeholder (comments) or nothing (likes) in
//! the public tables; the original data goes to `hidden_comments` and
//! `hidden_likes`, keyed by the successor account or the archive username.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use clio_core::defaults::{COMMENT_TYPE_HIDDEN, COMMENT_TYPE_VISIBLE, HIDDEN_COMMENT_BODY};
use clio_core::{Error, HiddenOwner, Result};

#[derive(Default)]
pub struct PgCommentRepository;

impl PgCommentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert_visible_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        comment_id: Uuid,
        post_id: Uuid,
        body: &str,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<()> {
        insert_comment(tx, comment_id, post_id, body, Some(user_id), date, COMMENT_TYPE_VISIBLE)
            .await
    }

    /// Insert a redacted comment and keep the real one in `hidden_comments`.
    pub async fn insert_hidden_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        comment_id: Uuid,
        post_id: Uuid,
        body: &str,
        owner: &HiddenOwner,
        date: DateTime<Utc>,
    ) -> Result<()> {
        insert_comment(tx, comment_id, post_id, HIDDEN_COMMENT_BODY, None, date, COMMENT_TYPE_HIDDEN)
            .await?;

        let (user_id, old_username) = owner_columns(owner);
        sqlx::query(
            r#"
            INSERT INTO hidden_comments (comment_id, body, user_id, old_username)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(comment_id)
        .bind(body)
        .bind(user_id)
        .bind(old_username)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_like_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO likes (post_id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(post_id)
            .bind(user_id)
            .bind(date)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_hidden_like_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        owner: &HiddenOwner,
        date: DateTime<Utc>,
    ) -> Result<()> {
        let (user_id, old_username) = owner_columns(owner);
        sqlx::query(
            "INSERT INTO hidden_likes (post_id, user_id, old_username, date) VALUES ($1, $2, $3, $4)",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(old_username)
        .bind(date)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

async fn insert_comment(
    tx: &mut Transaction<'_, Postgres>,
    comment_id: Uuid,
    post_id: Uuid,
    body: &str,
    user_id: Option<Uuid>,
    date: DateTime<Utc>,
    hide_type: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO comments (uid, post_id, body, user_id, created_at, updated_at, hide_type)
        VALUES ($1, $2, $3, $4, $5, $5, $6)
        "#,
    )
    .bind(comment_id)
    .bind(post_id)
    .bind(body)
    .bind(user_id)
    .bind(date)
    .bind(hide_type)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

fn owner_columns(owner: &HiddenOwner) -> (Option<Uuid>, Option<&str>) {
    match owner {
        HiddenOwner::UserId(id) => (Some(*id), None),
        HiddenOwner::OldUsername(name) => (None, Some(name.as_str())),
    }
}
