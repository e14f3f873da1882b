//! Image attachment creation: probing, reorientation, size variants, upload.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use tracing::{debug, warn};
use uuid::Uuid;

use clio_core::{
    jpeg_orientation, needs_reorientation, AttachmentStore, ImageKind, ImageSizeRecord,
    ImageSizes, ImageTranscoder, NewImageAttachment, Result, IMAGE_SIZE_BOXES,
};

/// Scale `w` x `h` to the largest size that fits into `fit_w` x `fit_h`,
/// keeping the aspect ratio. Both results are at least 1.
pub fn fit_into(w: u32, h: u32, fit_w: u32, fit_h: u32) -> (u32, u32) {
    let (w, h, fit_w, fit_h) = (w as u64, h as u64, fit_w as u64, fit_h as u64);
    let (new_w, new_h) = if w * fit_h > h * fit_w {
        (fit_w, h * fit_w / w.max(1))
    } else {
        (w * fit_h / h.max(1), fit_h)
    };
    (new_w.max(1) as u32, new_h.max(1) as u32)
}

/// Format and pixel size of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
}

/// Sniff the real format and dimensions of `data`; declared types are not
/// trusted. Returns `None` for anything but JPEG, PNG and GIF.
pub fn probe(data: &[u8]) -> Option<ImageInfo> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format().ok()?;
    let kind = match reader.format()? {
        ImageFormat::Jpeg => ImageKind::Jpeg,
        ImageFormat::Png => ImageKind::Png,
        ImageFormat::Gif => ImageKind::Gif,
        _ => return None,
    };
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageInfo {
        kind,
        width,
        height,
    })
}

/// Turns image bytes into uploaded variants and an attachment row.
pub struct ImageIngester<'a> {
    pub store: &'a dyn AttachmentStore,
    pub transcoder: &'a dyn ImageTranscoder,
    /// Public base URL of the store, without trailing slash.
    pub attachments_url: &'a str,
}

impl ImageIngester<'_> {
    /// Build and upload all variants of an image.
    ///
    /// `Ok(None)` means the bytes are not a supported image. Store failures
    /// are errors; a failed variant is only left out.
    pub async fn make_attachment(
        &self,
        data: Vec<u8>,
        display_name: &str,
        ord: i32,
    ) -> Result<Option<NewImageAttachment>> {
        let Some(mut info) = probe(&data) else {
            warn!(
                subsystem = "media",
                component = "images",
                op = "make_attachment",
                size_bytes = data.len(),
                "Cannot decode image"
            );
            return Ok(None);
        };

        let mut data = data;
        if info.kind == ImageKind::Jpeg && needs_reorientation(jpeg_orientation(&data)) {
            match self.transcoder.reorient(&data).await {
                Ok(upright) if !upright.is_empty() => {
                    if let Some(upright_info) = probe(&upright) {
                        info = upright_info;
                        data = upright;
                    }
                }
                Ok(_) => warn!(subsystem = "media", component = "images", "Cannot auto-orient image: empty result"),
                Err(e) => warn!(subsystem = "media", component = "images", error = %e, "Cannot auto-orient image"),
            }
        }

        let id = Uuid::new_v4();
        let ext = info.kind.extension();
        let mut sizes = ImageSizes::new();

        for size_box in IMAGE_SIZE_BOXES.iter() {
            let (width, height, variant) = if size_box.key == "o" {
                (info.width, info.height, None)
            } else {
                if info.width <= size_box.width && info.height <= size_box.height {
                    continue;
                }
                let (w, h) = fit_into(info.width, info.height, size_box.width, size_box.height);
                match self.transcoder.resize(&data, info.kind, w, h).await {
                    Ok(resized) if !resized.is_empty() => (w, h, Some(resized)),
                    Ok(_) => {
                        warn!(subsystem = "media", component = "images", size = size_box.key, "Cannot resize image: empty result");
                        continue;
                    }
                    Err(e) => {
                        warn!(subsystem = "media", component = "images", size = size_box.key, error = %e, "Cannot resize image");
                        continue;
                    }
                }
            };

            let path = format!("{}/{}.{}", size_box.dir, id, ext);
            let body = variant.as_deref().unwrap_or(&data);
            self.store
                .put(&path, body, info.kind.mime_type(), display_name)
                .await?;
            sizes.insert(
                size_box.key.to_string(),
                ImageSizeRecord {
                    w: width,
                    h: height,
                    url: format!("{}/{}", self.attachments_url, path),
                },
            );
        }

        debug!(
            subsystem = "media",
            component = "images",
            op = "make_attachment",
            attachment_id = %id,
            variants = sizes.len(),
            "Created image attachment"
        );

        Ok(Some(NewImageAttachment {
            id,
            ord,
            file_name: display_name.to_string(),
            file_size: data.len() as i64,
            kind: info.kind,
            sizes,
        }))
    }
}
