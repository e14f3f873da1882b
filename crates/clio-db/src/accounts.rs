//! Resolution of archive-era usernames to successor accounts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use clio_core::{Account, AccountFeeds, Error, FeedRef, Result};

const ACCOUNT_SQL: &str = r#"
    SELECT
        u.username,
        a.user_id,
        a.has_archive,
        a.disable_comments,
        a.restore_self_comments,
        a.restore_comments_and_likes,
        pf.id AS posts_feed_id, pf.uid AS posts_feed_uid,
        cf.id AS comments_feed_id, cf.uid AS comments_feed_uid,
        lf.id AS likes_feed_id, lf.uid AS likes_feed_uid
    FROM archives a
    JOIN users u ON a.user_id = u.uid
    JOIN feeds pf ON pf.user_id = u.uid AND pf.name = 'Posts'
    JOIN feeds cf ON cf.user_id = u.uid AND cf.name = 'Comments'
    JOIN feeds lf ON lf.user_id = u.uid AND lf.name = 'Likes'
    WHERE a.old_username = $1
"#;

/// Cached account lookups for one restore run.
///
/// Each username is queried at most once; unknown usernames resolve to an
/// account without a successor id.
pub struct PgAccountRepository {
    pool: Pool<Postgres>,
    cache: Mutex<HashMap<String, Arc<Account>>>,
}

impl PgAccountRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve an archive username. Only database failures are errors.
    pub async fn resolve(&self, old_username: &str) -> Result<Arc<Account>> {
        if let Some(acc) = self.cached(old_username) {
            return Ok(acc);
        }

        let row = sqlx::query(ACCOUNT_SQL)
            .bind(old_username)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let account = match row {
            Some(row) => Account {
                old_username: old_username.to_string(),
                new_username: row.get("username"),
                user_id: Some(row.get("user_id")),
                has_archive: row.get("has_archive"),
                disable_comments: row.get("disable_comments"),
                restore_self_comments: row.get("restore_self_comments"),
                restore_comments_and_likes: row.get("restore_comments_and_likes"),
                feeds: AccountFeeds {
                    posts: FeedRef {
                        id: row.get("posts_feed_id"),
                        uid: row.get("posts_feed_uid"),
                    },
                    comments: FeedRef {
                        id: row.get("comments_feed_id"),
                        uid: row.get("comments_feed_uid"),
                    },
                    likes: FeedRef {
                        id: row.get("likes_feed_id"),
                        uid: row.get("likes_feed_uid"),
                    },
                },
            },
            None => Account::unknown(old_username),
        };

        debug!(
            subsystem = "db",
            component = "accounts",
            op = "resolve",
            old_username = %old_username,
            exists = account.exists(),
            "Account resolved"
        );

        let account = Arc::new(account);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(old_username.to_string(), Arc::clone(&account));
        Ok(account)
    }

    fn cached(&self, old_username: &str) -> Option<Arc<Account>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(old_username)
            .cloned()
    }
}
