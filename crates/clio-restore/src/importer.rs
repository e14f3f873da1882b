//! Per-entry restoration: one transaction per archive entry.
//!
//! ```text
//! is_imported? ── yes ──> skip
//!      │ no
//! BEGIN ─> attachments ─> post ─> name/via ─> hashtags ─> link attachments
//!       ─> comments ─> likes ─> feed fan-out ─> COMMIT
//! ```
//!
//! Any error inside the transaction rolls the entry back and is returned to
//! the caller; the run stops there and a later run resumes at this entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use clio_core::{
    Account, ArchiveEntry, Comment, Error, FeedRef, Like, Result, StatKind, Visibility,
};
use clio_db::{Database, HashtagEntity, NewPost};

use crate::resolver::AttachmentResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    AlreadyImported,
    Imported { post_id: Uuid },
}

/// Feeds a post reached directly, keyed by feed UUID.
#[derive(Debug, Default)]
struct TouchedFeeds(HashMap<Uuid, i32>);

impl TouchedFeeds {
    fn add(&mut self, feed: FeedRef) {
        self.0.insert(feed.uid, feed.id);
    }

    fn uids(&self) -> Vec<Uuid> {
        self.0.keys().copied().collect()
    }

    /// Touched feeds plus the given river feeds, sorted and deduplicated.
    fn with_rivers(&self, rivers: Vec<i32>) -> Vec<i32> {
        let mut ids = rivers;
        ids.extend(self.0.values().copied());
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

fn require_user(acc: &Account) -> Result<Uuid> {
    acc.user_id.ok_or_else(|| {
        Error::NotFound(format!("@{} has no account to restore into", acc.old_username))
    })
}

pub struct EntryImporter {
    db: Arc<Database>,
    resolver: AttachmentResolver,
}

impl EntryImporter {
    pub fn new(db: Arc<Database>, resolver: AttachmentResolver) -> Self {
        Self { db, resolver }
    }

    /// Restore one entry unless it was restored before.
    pub async fn restore_entry(&self, entry: &ArchiveEntry) -> Result<RestoreOutcome> {
        if self.db.posts.is_imported(&entry.name).await? {
            info!(
                subsystem = "restore",
                component = "importer",
                op = "restore_entry",
                entry_name = %entry.name,
                "Entry already imported"
            );
            return Ok(RestoreOutcome::AlreadyImported);
        }

        let start = Instant::now();
        let author = self.db.accounts.resolve(&entry.author).await?;
        let mut tx = self.db.begin().await?;

        match self.restore_in_tx(&mut tx, entry, &author).await {
            Ok(post_id) => {
                if let Err(e) = tx.commit().await {
                    self.db.discard_caches();
                    return Err(Error::Database(e));
                }
                self.db.commit_caches();
                info!(
                    subsystem = "restore",
                    component = "importer",
                    op = "restore_entry",
                    entry_name = %entry.name,
                    post_id = %post_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Entry restored"
                );
                Ok(RestoreOutcome::Imported { post_id })
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(
                        subsystem = "restore",
                        component = "importer",
                        entry_name = %entry.name,
                        error = %rb,
                        "Rollback failed"
                    );
                }
                self.db.discard_caches();
                Err(e)
            }
        }
    }

    async fn restore_in_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        entry: &ArchiveEntry,
        author: &Account,
    ) -> Result<Uuid> {
        let db = self.db.as_ref();
        let author_id = require_user(author)?;

        let attachments = self.resolver.resolve_tx(tx, db, entry, author).await?;

        let mut body = entry.body.clone();
        if let Some(suffix) = &attachments.body_suffix {
            body.push_str(suffix);
        }

        let post_id = Uuid::new_v4();
        db.posts
            .insert_tx(
                tx,
                &NewPost {
                    id: post_id,
                    body,
                    user_id: author_id,
                    created_at: entry.date,
                    updated_at: entry.updated_at(),
                    comments_disabled: author.disable_comments,
                    destination_feed_id: author.feeds.posts.id,
                },
            )
            .await?;
        info!(
            subsystem = "restore",
            component = "importer",
            op = "insert_post",
            entry_name = %entry.name,
            post_id = %post_id,
            "Created post"
        );

        db.posts
            .register_name_tx(tx, post_id, &entry.name, entry.url.as_deref())
            .await?;

        let via_id = db.via.id_for_tx(tx, &entry.via).await?;
        if via_id != 0 {
            db.posts.register_via_tx(tx, post_id, via_id).await?;
        }

        db.hashtags
            .add_usages_tx(tx, &entry.hashtags, post_id, HashtagEntity::Post)
            .await?;

        db.attachments
            .link_to_post_tx(tx, &attachments.ids(), post_id, author_id, entry.date)
            .await?;

        db.stats.increment_tx(tx, author_id, StatKind::Posts).await?;

        let mut feeds = TouchedFeeds::default();
        feeds.add(author.feeds.posts);

        for comment in &entry.comments {
            let commenter = db.accounts.resolve(&comment.author).await?;
            let visibility = self.add_comment(tx, post_id, author, &commenter, comment).await?;
            if visibility == Visibility::Visible {
                feeds.add(commenter.feeds.comments);
                db.stats
                    .increment_tx(tx, require_user(&commenter)?, StatKind::Comments)
                    .await?;
            }
        }

        for like in &entry.likes {
            let liker = db.accounts.resolve(&like.author).await?;
            if self.add_like(tx, post_id, &liker, like).await? == Visibility::Visible {
                feeds.add(liker.feeds.likes);
                db.stats
                    .increment_tx(tx, require_user(&liker)?, StatKind::Likes)
                    .await?;
            }
        }

        let rivers = db.posts.subscriber_rivers_tx(tx, &feeds.uids()).await?;
        let feed_ids = feeds.with_rivers(rivers);
        debug!(
            subsystem = "restore",
            component = "importer",
            op = "fan_out",
            post_id = %post_id,
            feeds = feed_ids.len(),
            "Updating post feeds"
        );
        db.posts.set_feed_ids_tx(tx, post_id, &feed_ids).await?;

        Ok(post_id)
    }

    async fn add_comment(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        post_id: Uuid,
        post_author: &Account,
        commenter: &Account,
        comment: &Comment,
    ) -> Result<Visibility> {
        let db = self.db.as_ref();
        let comment_id = Uuid::new_v4();
        let visibility = commenter.comment_visibility(post_author);

        match visibility {
            Visibility::Visible => {
                db.comments
                    .insert_visible_tx(
                        tx,
                        comment_id,
                        post_id,
                        &comment.body,
                        require_user(commenter)?,
                        comment.date,
                    )
                    .await?;
                db.hashtags
                    .add_usages_tx(tx, &comment.hashtags, comment_id, HashtagEntity::Comment)
                    .await?;
            }
            Visibility::Hidden => {
                db.comments
                    .insert_hidden_tx(
                        tx,
                        comment_id,
                        post_id,
                        &comment.body,
                        &commenter.hidden_owner(),
                        comment.date,
                    )
                    .await?;
            }
        }
        Ok(visibility)
    }

    async fn add_like(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        post_id: Uuid,
        liker: &Account,
        like: &Like,
    ) -> Result<Visibility> {
        let db = self.db.as_ref();
        let visibility = liker.like_visibility();
        match visibility {
            Visibility::Visible => {
                db.comments
                    .insert_like_tx(tx, post_id, require_user(liker)?, like.date)
                    .await?;
            }
            Visibility::Hidden => {
                db.comments
                    .insert_hidden_like_tx(tx, post_id, &liker.hidden_owner(), like.date)
                    .await?;
            }
        }
        Ok(visibility)
    }
}
