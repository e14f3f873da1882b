//! # clio-db
//!
//! PostgreSQL layer of clio-restore: repositories over the FreeFeed schema
//! used while restoring a FriendFeed archive.
//!
//! Repositories whose writes belong to an entry take the entry's open
//! transaction (`*_tx` methods); read-only lookups go through the pool.
//!
//! ## Example
//!
//! ```rust,ignore
//! use clio_db::Database;
//!
//! let db = Database::connect("postgres://localhost/freefeed").await?;
//! if !db.posts.is_imported("e/0a1b2c3d").await? {
//!     let mut tx = db.begin().await?;
//!     // ...
//!     tx.commit().await?;
//!     db.commit_caches();
//! }
//! ```

pub mod accounts;
pub mod archives;
pub mod attachments;
pub mod comments;
pub mod hashtag_extraction;
pub mod hashtags;
pub mod id_cache;
pub mod pool;
pub mod posts;
pub mod stats;
pub mod test_fixtures;
pub mod via;

pub use accounts::PgAccountRepository;
pub use archives::{PgArchiveRepository, ViaSettings};
pub use attachments::PgAttachmentRepository;
pub use comments::PgCommentRepository;
pub use hashtag_extraction::extract_hashtags;
pub use hashtags::{HashtagEntity, PgHashtagRepository};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use posts::{NewPost, PgPostRepository};
pub use stats::PgUserStatsRepository;
pub use via::PgViaRepository;

pub use clio_core::{Error, Result};

use sqlx::{Pool, Postgres, Transaction};

/// Combined database context with all repositories of one restore run.
pub struct Database {
    /// The underlying connection pool.
    pub pool: Pool<Postgres>,
    /// Archive username → successor account.
    pub accounts: PgAccountRepository,
    /// Owner archive settings and recovery status.
    pub archives: PgArchiveRepository,
    pub attachments: PgAttachmentRepository,
    pub comments: PgCommentRepository,
    pub hashtags: PgHashtagRepository,
    pub posts: PgPostRepository,
    pub stats: PgUserStatsRepository,
    /// Via-source registry.
    pub via: PgViaRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            accounts: PgAccountRepository::new(pool.clone()),
            archives: PgArchiveRepository::new(pool.clone()),
            attachments: PgAttachmentRepository::new(),
            comments: PgCommentRepository::new(),
            hashtags: PgHashtagRepository::new(pool.clone()),
            posts: PgPostRepository::new(pool.clone()),
            stats: PgUserStatsRepository::new(),
            via: PgViaRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database with the default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Open the transaction of one entry.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }

    /// Make registry ids seen in the committed transaction permanent.
    pub fn commit_caches(&self) {
        self.via.commit_pending();
        self.hashtags.commit_pending();
    }

    /// Drop registry ids seen in a rolled back transaction.
    pub fn discard_caches(&self) {
        self.via.discard_pending();
        self.hashtags.discard_pending();
    }
}
