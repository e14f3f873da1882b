//! Non-image attachments: audio and generic files bundled with the archive.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use id3::{Tag, TagLike};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use clio_core::defaults::ATTACHMENTS_DIR;
use clio_core::{AttachmentStore, FileRef, MediaType, NewFileAttachment, Result};

use crate::media_index::LocalFile;

static SUPPORTED_EXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpe?g|png|gif|mp3|m4a|ogg|wav|txt|pdf|docx?|pptx?|xlsx?)$").unwrap()
});

fn audio_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "audio/mpeg" => Some("mp3"),
        "audio/x-m4a" | "audio/mp4" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        "audio/x-wav" => Some("wav"),
        _ => None,
    }
}

pub fn media_type(content_type: &str) -> MediaType {
    if audio_extension(content_type).is_some() {
        MediaType::Audio
    } else {
        MediaType::General
    }
}

/// Stored extension: from the audio type, else from a known file name
/// suffix, else none.
pub fn file_extension(content_type: &str, name: &str) -> String {
    if let Some(ext) = audio_extension(content_type) {
        return ext.to_string();
    }
    SUPPORTED_EXT_RE
        .captures(name)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

/// Title and artist of an MP3, if its ID3 tag is readable.
pub fn mp3_metadata(data: &[u8]) -> Option<(String, String)> {
    let tag = match Tag::read_from2(Cursor::new(data)) {
        Ok(tag) => tag,
        Err(e) => {
            debug!(subsystem = "media", component = "files", error = %e, "No readable ID3 tag");
            return None;
        }
    };
    let clean = |s: Option<&str>| s.unwrap_or("").replace('\u{0}', "");
    Some((clean(tag.title()), clean(tag.artist())))
}

/// A file reference matched to its bundled payload.
#[derive(Debug)]
pub struct FoundFile<'a> {
    pub reference: &'a FileRef,
    pub local: &'a LocalFile,
}

/// Upload one bundled file and describe its attachment row.
pub async fn store_file(
    store: &dyn AttachmentStore,
    found: &FoundFile<'_>,
    ord: i32,
    created_at: DateTime<Utc>,
    user_id: Option<Uuid>,
) -> Result<NewFileAttachment> {
    let file = found.reference;
    let data = found.local.read()?;

    let (title, artist) = if file.content_type == "audio/mpeg" {
        mp3_metadata(&data).unwrap_or_default()
    } else {
        (String::new(), String::new())
    };

    let id = Uuid::new_v4();
    let extension = file_extension(&file.content_type, &file.name);
    let path = if extension.is_empty() {
        format!("{}/{}", ATTACHMENTS_DIR, id)
    } else {
        format!("{}/{}.{}", ATTACHMENTS_DIR, id, extension)
    };

    store.put(&path, &data, &file.content_type, &file.name).await?;
    debug!(
        subsystem = "media",
        component = "files",
        op = "store_file",
        attachment_id = %id,
        size_bytes = data.len(),
        "Stored bundled file"
    );

    Ok(NewFileAttachment {
        id,
        ord,
        created_at,
        file_name: file.name.clone(),
        file_size: found.local.size() as i64,
        mime_type: file.content_type.clone(),
        media_type: media_type(&file.content_type),
        extension,
        user_id,
        artist,
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{zip_source, RecordingStore};
    use chrono::TimeZone;
    use clio_core::ArchiveSource;
    use id3::Version;
    use std::sync::Arc;

    fn mp3_with_tag(title: &str, artist: &str) -> Vec<u8> {
        let mut tag = Tag::new();
        tag.set_title(title);
        tag.set_artist(artist);
        let mut out = Vec::new();
        tag.write_to(&mut out, Version::Id3v24).unwrap();
        out.extend_from_slice(&[0xff, 0xfb, 0x90, 0x00]);
        out
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("audio/mpeg"), MediaType::Audio);
        assert_eq!(media_type("audio/x-wav"), MediaType::Audio);
        assert_eq!(media_type("application/pdf"), MediaType::General);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("audio/mp4", "track.bin"), "m4a");
        assert_eq!(file_extension("application/pdf", "Report.PDF"), "PDF");
        assert_eq!(file_extension("application/msword", "notes.doc"), "doc");
        assert_eq!(file_extension("application/zip", "archive.zip"), "");
    }

    #[test]
    fn test_mp3_metadata() {
        let (title, artist) = mp3_metadata(&mp3_with_tag("Song", "Band")).unwrap();
        assert_eq!(title, "Song");
        assert_eq!(artist, "Band");
    }

    #[test]
    fn test_mp3_metadata_garbage() {
        assert_eq!(mp3_metadata(b"not an mp3"), None);
    }

    #[tokio::test]
    async fn test_store_file() {
        let song = mp3_with_tag("Song", "Band");
        let source: Arc<dyn ArchiveSource> =
            Arc::new(zip_source(&[("alice/files/song.mp3", song.as_slice())]));
        let local = LocalFile::new(source, "alice/files/song.mp3", "song.mp3");
        let reference = FileRef {
            url: "http://m.friendfeed-media.com/cc33".into(),
            content_type: "audio/mpeg".into(),
            name: "My song.mp3".into(),
        };
        let store = RecordingStore::default();
        let date = Utc.with_ymd_and_hms(2009, 5, 1, 10, 0, 0).unwrap();
        let user = Uuid::new_v4();

        let att = store_file(
            &store,
            &FoundFile {
                reference: &reference,
                local: &local,
            },
            3,
            date,
            Some(user),
        )
        .await
        .unwrap();

        assert_eq!(att.ord, 3);
        assert_eq!(att.media_type, MediaType::Audio);
        assert_eq!(att.extension, "mp3");
        assert_eq!(att.title, "Song");
        assert_eq!(att.artist, "Band");
        assert_eq!(att.file_size, song.len() as i64);
        assert_eq!(att.user_id, Some(user));

        let puts = store.puts();
        assert_eq!(puts[0].path, format!("attachments/{}.mp3", att.id));
        assert_eq!(puts[0].display_name, "My song.mp3");
        assert_eq!(puts[0].content_type, "audio/mpeg");
    }
}
