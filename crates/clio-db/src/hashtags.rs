//! Hashtag dictionary (`hashtags`) and usage links (`hashtag_usages`).

use sqlx::{Pool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use clio_core::{Error, Result};

use crate::id_cache::IdCache;
use crate::via::MAX_REGISTER_ATTEMPTS;

const UPSERT_HASHTAG_SQL: &str = r#"
    WITH ins AS (
        INSERT INTO hashtags (name) VALUES ($1)
        ON CONFLICT (name) DO NOTHING
        RETURNING id
    )
    SELECT id FROM ins
    UNION ALL
    SELECT id FROM hashtags WHERE name = $1
    LIMIT 1
"#;

/// Kind of entity a hashtag is used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashtagEntity {
    Post,
    Comment,
}

impl HashtagEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashtagEntity::Post => "post",
            HashtagEntity::Comment => "comment",
        }
    }
}

/// PostgreSQL-backed hashtag registry with a run-wide cache.
pub struct PgHashtagRepository {
    pool: Pool<Postgres>,
    cache: IdCache,
}

impl PgHashtagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            cache: IdCache::new(),
        }
    }

    /// Id of the hashtag, case-insensitively; created on first use.
    pub async fn id_for_tx(&self, tx: &mut Transaction<'_, Postgres>, tag: &str) -> Result<i32> {
        let name = tag.to_lowercase();
        if let Some(id) = self.cache.get(&name) {
            return Ok(id);
        }

        for attempt in 1..=MAX_REGISTER_ATTEMPTS {
            let id: Option<i32> = sqlx::query_scalar(UPSERT_HASHTAG_SQL)
                .bind(&name)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;

            if let Some(id) = id {
                self.cache.insert_pending(&name, id);
                return Ok(id);
            }

            debug!(
                subsystem = "db",
                component = "hashtags",
                op = "register",
                hashtag = %name,
                attempt,
                "Hashtag insert lost a race, retrying"
            );
        }

        Err(Error::Internal(format!(
            "cannot register hashtag {} after {} attempts",
            name, MAX_REGISTER_ATTEMPTS
        )))
    }

    /// Link every tag to the entity; repeated usages are ignored.
    pub async fn add_usages_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tags: &[String],
        entity_id: Uuid,
        entity: HashtagEntity,
    ) -> Result<()> {
        for tag in tags {
            let hashtag_id = self.id_for_tx(tx, tag).await?;
            sqlx::query(
                r#"
                INSERT INTO hashtag_usages (hashtag_id, entity_id, type)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(hashtag_id)
            .bind(entity_id)
            .bind(entity.as_str())
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    /// Hashtag names used by an entity, sorted.
    pub async fn usages_of(&self, entity_id: Uuid) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT h.name FROM hashtag_usages u
            JOIN hashtags h ON h.id = u.hashtag_id
            WHERE u.entity_id = $1
            ORDER BY h.name
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    pub fn commit_pending(&self) {
        self.cache.commit();
    }

    pub fn discard_pending(&self) {
        self.cache.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_names() {
        assert_eq!(HashtagEntity::Post.as_str(), "post");
        assert_eq!(HashtagEntity::Comment.as_str(), "comment");
    }
}
