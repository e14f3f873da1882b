//! Registry of "posted via" sources (`archive_via`).

use sqlx::{Pool, Postgres, Transaction};
use tracing::debug;

use clio_core::defaults::DEFAULT_VIA_URL;
use clio_core::{Error, Result, ViaSource};

use crate::id_cache::IdCache;

/// How many times a lost insert race is retried before giving up.
pub const MAX_REGISTER_ATTEMPTS: usize = 3;

/// Insert the url if it is new, otherwise read the existing id.
///
/// Returns no row only when a concurrent transaction committed the same url
/// after this statement took its snapshot.
const UPSERT_VIA_SQL: &str = r#"
    WITH ins AS (
        INSERT INTO archive_via (url, title) VALUES ($1, $2)
        ON CONFLICT (url) DO NOTHING
        RETURNING id
    )
    SELECT id FROM ins
    UNION ALL
    SELECT id FROM archive_via WHERE url = $1
    LIMIT 1
"#;

/// PostgreSQL-backed via-source registry with a run-wide cache.
pub struct PgViaRepository {
    pool: Pool<Postgres>,
    cache: IdCache,
}

impl PgViaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            cache: IdCache::new(),
        }
    }

    /// Id of the via record for `via`, or 0 for the direct-post source.
    ///
    /// The direct-post source never touches the database.
    pub async fn id_for_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        via: &ViaSource,
    ) -> Result<i32> {
        if via.url == DEFAULT_VIA_URL {
            return Ok(0);
        }
        if let Some(id) = self.cache.get(&via.url) {
            return Ok(id);
        }

        for attempt in 1..=MAX_REGISTER_ATTEMPTS {
            let id: Option<i32> = sqlx::query_scalar(UPSERT_VIA_SQL)
                .bind(&via.url)
                .bind(&via.name)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;

            if let Some(id) = id {
                debug!(
                    subsystem = "db",
                    component = "via",
                    op = "register",
                    url = %via.url,
                    via_id = id,
                    "Via source resolved"
                );
                self.cache.insert_pending(&via.url, id);
                return Ok(id);
            }

            debug!(
                subsystem = "db",
                component = "via",
                op = "register",
                url = %via.url,
                attempt,
                "Via insert lost a race, retrying"
            );
        }

        Err(Error::Internal(format!(
            "cannot register via source {} after {} attempts",
            via.url, MAX_REGISTER_ATTEMPTS
        )))
    }

    /// Number of via records currently stored.
    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT count(*) FROM archive_via")
            .fetch_one(&self.pool)
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
