//! Lifetime counters in `user_stats`.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use clio_core::{Error, Result, StatKind};

#[derive(Default)]
pub struct PgUserStatsRepository;

impl PgUserStatsRepository {
    pub fn new() -> Self {
        Self
    }

    /// Add one to the user's posts, comments or likes counter.
    pub async fn increment_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        kind: StatKind,
    ) -> Result<()> {
        // Column names come from a closed enum, never from input.
        let column = kind.column();
        sqlx::query(&format!(
            "UPDATE user_stats SET {col} = {col} + 1 WHERE user_id = $1",
            col = column
        ))
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
