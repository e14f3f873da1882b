//! Per-user archive settings in the `archives` table.

use std::collections::HashSet;

use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use clio_core::{Error, Result, ViaStat};

/// Via sources found in an archive and the ones its owner chose to restore.
#[derive(Debug, Clone, Default)]
pub struct ViaSettings {
    pub stats: Vec<ViaStat>,
    pub restore: HashSet<String>,
}

impl ViaSettings {
    pub fn allows(&self, via_url: &str) -> bool {
        self.restore.contains(via_url)
    }

    /// Number of entries in all sources.
    pub fn total_entries(&self) -> i64 {
        self.stats.iter().map(|s| s.count).sum()
    }

    /// Number of entries in the sources selected for restore.
    pub fn entries_to_restore(&self) -> i64 {
        self.stats
            .iter()
            .filter(|s| self.allows(&s.via.url))
            .map(|s| s.count)
            .sum()
    }
}

pub struct PgArchiveRepository {
    pool: Pool<Postgres>,
}

impl PgArchiveRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn recovery_status(&self, user_id: Uuid) -> Result<i32> {
        sqlx::query_scalar("SELECT recovery_status FROM archives WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("archive of user {}", user_id)))
    }

    pub async fn set_recovery_status(&self, user_id: Uuid, status: i32) -> Result<()> {
        sqlx::query("UPDATE archives SET recovery_status = $1 WHERE user_id = $2")
            .bind(status)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn via_settings(&self, old_username: &str) -> Result<ViaSettings> {
        let row = sqlx::query(
            "SELECT via_sources, via_restore FROM archives WHERE old_username = $1",
        )
        .bind(old_username)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("archive of {}", old_username)))?;

        let sources: Option<serde_json::Value> = row.get("via_sources");
        let restore: Option<Vec<String>> = row.get("via_restore");

        let stats = match sources {
            Some(value) if !value.is_null() => serde_json::from_value(value)?,
            _ => Vec::new(),
        };

        Ok(ViaSettings {
            stats,
            restore: restore.unwrap_or_default().into_iter().collect(),
        })
    }
}
