//! Attachment rows. Attachments are inserted before their post exists and
//! linked to it once the post row is written.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use clio_core::{Error, MediaType, NewFileAttachment, NewImageAttachment, Result};

#[derive(Default)]
pub struct PgAttachmentRepository;

impl PgAttachmentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert_image_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        att: &NewImageAttachment,
    ) -> Result<()> {
        let sizes = serde_json::to_value(&att.sizes)?;
        sqlx::query(
            r#"
            INSERT INTO attachments (
                uid, ord, file_name, file_size, mime_type, media_type,
                file_extension, no_thumbnail, image_sizes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(att.id)
        .bind(att.ord)
        .bind(&att.file_name)
        .bind(att.file_size)
        .bind(att.kind.mime_type())
        .bind(MediaType::Image.as_str())
        .bind(att.kind.extension())
        .bind(att.sizes.len() == 1)
        .bind(sizes)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_file_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        att: &NewFileAttachment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attachments (
                uid, ord, created_at, updated_at, file_name, file_size,
                mime_type, media_type, file_extension, user_id, artist, title
            )
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(att.id)
        .bind(att.ord)
        .bind(att.created_at)
        .bind(&att.file_name)
        .bind(att.file_size)
        .bind(&att.mime_type)
        .bind(att.media_type.as_str())
        .bind(&att.extension)
        .bind(att.user_id)
        .bind(&att.artist)
        .bind(&att.title)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Attach the rows to their post and stamp owner and dates.
    pub async fn link_to_post_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
        post_id: Uuid,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE attachments
            SET post_id = $1, user_id = $2, created_at = $3, updated_at = $3
            WHERE uid = ANY($4)
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(date)
        .bind(ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
