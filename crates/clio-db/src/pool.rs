//! Postgres pool of a restore run.
//!
//! A run holds at most one entry transaction at a time, so the pool stays
//! small. Tests bind every connection to their own schema through
//! [`PoolConfig::search_path`].

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use tracing::{debug, info};

use clio_core::{Error, Result};

/// One connection holds the entry transaction, one serves the idempotency
/// checks and account lookups.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
    /// Schema searched before `public` on every connection.
    pub search_path: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            search_path: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn search_path(mut self, schema: impl Into<String>) -> Self {
        self.search_path = Some(schema.into());
        self
    }
}

/// `SET search_path` statement putting `schema` in front of `public`.
pub fn search_path_statement(schema: &str) -> String {
    format!(
        "SET search_path TO \"{}\", public",
        schema.replace('"', "\"\"")
    )
}

/// Connect with the default configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    if let Some(schema) = &config.search_path {
        let stmt = search_path_statement(schema);
        options = options.after_connect(move |conn, _meta| {
            let stmt = stmt.clone();
            Box::pin(async move {
                conn.execute(stmt.as_str()).await?;
                Ok(())
            })
        });
    }

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        schema = config.search_path.as_deref().unwrap_or("public"),
        duration_ms = start.elapsed().as_millis() as u64,
        "Connected to database"
    );
    Ok(pool)
}

pub fn log_pool_metrics(pool: &PgPool) {
    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        "Pool health check"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .search_path("test_abc");

        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.search_path.as_deref(), Some("test_abc"));
        assert!(PoolConfig::default().search_path.is_none());
    }

    #[test]
    fn test_search_path_statement_quotes_schema() {
        assert_eq!(
            search_path_statement("test_1f2e"),
            r#"SET search_path TO "test_1f2e", public"#
        );
        assert_eq!(
            search_path_statement(r#"a"b"#),
            r#"SET search_path TO "a""b", public"#
        );
    }
}
