//! Attachment resolution: turns an entry's thumbnails and files into stored
//! attachments.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use clio_core::defaults::ACCEPTED_IMAGE_TYPES;
use clio_core::{
    Account, ArchiveEntry, AttachmentStore, ImageTranscoder, NewFileAttachment,
    NewImageAttachment, RemoteFetcher, Result,
};
use clio_db::Database;

use crate::files::{store_file, FoundFile};
use crate::images::ImageIngester;
use crate::media_index::{media_id, MediaIndex};
use crate::thumbnails::{plan_thumbnails, ImageRequest, FF_MEDIA_RE};

const FLICKR_OEMBED_URL: &str = "https://www.flickr.com/services/oembed?format=json&url=";
const FLICKR_MEDIUM_TAIL: &str = "_z.jpg?zz=1";

/// An attachment row ready to be inserted.
#[derive(Debug, Clone)]
pub enum PreparedAttachment {
    Image(NewImageAttachment),
    File(NewFileAttachment),
}

impl PreparedAttachment {
    pub fn id(&self) -> Uuid {
        match self {
            PreparedAttachment::Image(att) => att.id,
            PreparedAttachment::File(att) => att.id,
        }
    }

    pub fn ord(&self) -> i32 {
        match self {
            PreparedAttachment::Image(att) => att.ord,
            PreparedAttachment::File(att) => att.ord,
        }
    }
}

/// Attachments of one entry, thumbnails first, then files.
#[derive(Debug, Clone, Default)]
pub struct PreparedAttachments {
    pub attachments: Vec<PreparedAttachment>,
    /// Text the thumbnail rules want appended to the post body.
    pub body_suffix: Option<String>,
}

impl PreparedAttachments {
    pub fn ids(&self) -> Vec<Uuid> {
        self.attachments.iter().map(PreparedAttachment::id).collect()
    }
}

#[derive(Deserialize)]
struct OembedResponse {
    #[serde(default)]
    url: String,
}

pub struct AttachmentResolver {
    fetcher: Arc<dyn RemoteFetcher>,
    store: Arc<dyn AttachmentStore>,
    transcoder: Arc<dyn ImageTranscoder>,
    media: MediaIndex,
    attachments_url: String,
    next_ord: AtomicI32,
}

impl AttachmentResolver {
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        store: Arc<dyn AttachmentStore>,
        transcoder: Arc<dyn ImageTranscoder>,
        media: MediaIndex,
        attachments_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            store,
            transcoder,
            media,
            attachments_url: attachments_url.into().trim_end_matches('/').to_string(),
            next_ord: AtomicI32::new(0),
        }
    }

    /// Store all media of `entry` and insert their rows, unlinked.
    pub async fn resolve_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        db: &Database,
        entry: &ArchiveEntry,
        author: &Account,
    ) -> Result<PreparedAttachments> {
        let prepared = self.prepare(entry, author).await?;
        for att in &prepared.attachments {
            match att {
                PreparedAttachment::Image(image) => db.attachments.insert_image_tx(tx, image).await?,
                PreparedAttachment::File(file) => db.attachments.insert_file_tx(tx, file).await?,
            }
        }
        Ok(prepared)
    }

    /// Store all media of `entry` and describe the attachment rows.
    pub async fn prepare(&self, entry: &ArchiveEntry, author: &Account) -> Result<PreparedAttachments> {
        let plan = plan_thumbnails(entry);
        if !entry.thumbnails.is_empty() {
            debug!(
                subsystem = "media",
                component = "thumbnails",
                op = "plan",
                entry_name = %entry.name,
                rule = plan.rule,
                requests = plan.requests.len(),
                "Thumbnail rule matched"
            );
        }

        let mut attachments = Vec::new();
        for request in &plan.requests {
            if let Some(image) = self.create_image(request).await? {
                attachments.push(PreparedAttachment::Image(image));
            }
        }

        for found in self.find_files(entry) {
            let att = store_file(
                self.store.as_ref(),
                &found,
                self.take_ord(),
                entry.date,
                author.user_id,
            )
            .await?;
            attachments.push(PreparedAttachment::File(att));
        }

        if !attachments.is_empty() {
            info!(
                subsystem = "media",
                component = "resolver",
                op = "prepare",
                entry_name = %entry.name,
                attachment_count = attachments.len(),
                "Stored attachments"
            );
        }

        Ok(PreparedAttachments {
            attachments,
            body_suffix: plan.body_suffix,
        })
    }

    fn take_ord(&self) -> i32 {
        self.next_ord.fetch_add(1, Ordering::Relaxed)
    }

    fn find_files<'a>(&'a self, entry: &'a ArchiveEntry) -> Vec<FoundFile<'a>> {
        entry
            .files
            .iter()
            .filter_map(|f| {
                let local = self.media.files.get(media_id(&f.url)?)?;
                Some(FoundFile {
                    reference: f,
                    local,
                })
            })
            .collect()
    }

    /// First image the request yields, if any.
    async fn create_image(&self, request: &ImageRequest) -> Result<Option<NewImageAttachment>> {
        for url in &request.candidates {
            if let Some(att) = self.process_single_image(url).await? {
                return Ok(Some(att));
            }
        }
        if let Some(page) = &request.oembed_page {
            if let Some(url) = self.flickr_image_url(page).await {
                return self.process_single_image(&url).await;
            }
        }
        Ok(None)
    }

    async fn process_single_image(&self, url: &str) -> Result<Option<NewImageAttachment>> {
        let (data, display_name) = if let Some(caps) = FF_MEDIA_RE.captures(url) {
            let Some(local) = self.media.images.get(&caps[1]) else {
                warn!(subsystem = "media", component = "resolver", url, "Local image not found");
                return Ok(None);
            };
            let name = local.path.rsplit('/').next().unwrap_or(&local.path).to_string();
            (local.read()?, name)
        } else {
            match self.fetcher.get(url).await {
                Ok(body) if ACCEPTED_IMAGE_TYPES.contains(&body.content_type.as_str()) => {
                    (body.data, String::new())
                }
                Ok(body) => {
                    warn!(
                        subsystem = "media",
                        component = "resolver",
                        url,
                        content_type = %body.content_type,
                        "Unsupported content type"
                    );
                    return Ok(None);
                }
                Err(e) => {
                    warn!(subsystem = "media", component = "resolver", url, error = %e, "Cannot fetch image");
                    return Ok(None);
                }
            }
        };

        let ingester = ImageIngester {
            store: self.store.as_ref(),
            transcoder: self.transcoder.as_ref(),
            attachments_url: &self.attachments_url,
        };
        let ord = self.next_ord.load(Ordering::Relaxed);
        let att = ingester.make_attachment(data, &display_name, ord).await?;
        if att.is_some() {
            self.take_ord();
        }
        Ok(att)
    }

    /// Full-size image URL of a Flickr photo page, via its oEmbed data.
    async fn flickr_image_url(&self, page_url: &str) -> Option<String> {
        let oembed_url = format!("{}{}", FLICKR_OEMBED_URL, urlencoding::encode(page_url));
        let body = match self.fetcher.get(&oembed_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(subsystem = "media", component = "resolver", url = %oembed_url, error = %e, "Cannot get Flickr oEmbed page");
                return None;
            }
        };
        let oembed: OembedResponse = match serde_json::from_slice(&body.data) {
            Ok(o) => o,
            Err(e) => {
                warn!(subsystem = "media", component = "resolver", url = %oembed_url, error = %e, "Cannot parse Flickr oEmbed page");
                return None;
            }
        };
        if oembed.url.is_empty() {
            return None;
        }
        Some(match oembed.url.strip_suffix(FLICKR_MEDIUM_TAIL) {
            Some(base) => format!("{}.jpg", base),
            None => oembed.url,
        })
    }
}
