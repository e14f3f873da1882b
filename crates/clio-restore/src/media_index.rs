//! Indexes of media bundled with the archive, keyed by media id.
//!
//! A media id is the trailing hex part of a media URL, for example
//! `0a1b2c` in `http://m.friendfeed-media.com/0a1b2c`.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use clio_core::{ArchiveSource, Result};

static MEDIA_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-f]+$").unwrap());

static IMAGES_TSV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/_json/data/images\.tsv$").unwrap());
static FILES_TSV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/_json/data/files\.tsv$").unwrap());
static IMAGE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/images/media/([^/]+)$").unwrap());
static THUMB_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/images/media/thumbnails/(([0-9a-f]+).+)").unwrap());
static OTHER_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/files/([^/]+)$").unwrap());
static MP3_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9a-f]+)\.mp3$").unwrap());

/// Trailing hex id of a media URL.
pub fn media_id(url: &str) -> Option<&str> {
    MEDIA_ID_RE.find(url).map(|m| m.as_str())
}

/// A file inside an archive.
#[derive(Clone)]
pub struct LocalFile {
    source: Arc<dyn ArchiveSource>,
    pub path: String,
    /// File name as exported.
    pub name: String,
}

impl LocalFile {
    pub fn new(source: Arc<dyn ArchiveSource>, path: &str, name: &str) -> Self {
        Self {
            source,
            path: path.to_string(),
            name: name.to_string(),
        }
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        self.source.read(&self.path)
    }

    pub fn size(&self) -> u64 {
        self.source.size(&self.path).unwrap_or(0)
    }
}

impl std::fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFile")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish()
    }
}

/// Parse a `<media url>\t<file name>` index into file name → media id.
pub fn parse_tsv(text: &str) -> HashMap<String, String> {
    let mut name_to_id = HashMap::new();
    for line in text.lines() {
        let Some((url, name)) = line.split_once('\t') else {
            continue;
        };
        if let Some(id) = media_id(url) {
            name_to_id.insert(name.to_string(), id.to_string());
        }
    }
    name_to_id
}

/// Bundled images and other files of one run.
#[derive(Debug, Default)]
pub struct MediaIndex {
    pub images: HashMap<String, LocalFile>,
    pub files: HashMap<String, LocalFile>,
}

impl MediaIndex {
    /// Index the images and files of an archive.
    pub fn build(source: Arc<dyn ArchiveSource>) -> Result<Self> {
        let names = source.file_names();
        let image_ids = read_tsv(source.as_ref(), &names, &IMAGES_TSV_RE)?;
        let file_ids = read_tsv(source.as_ref(), &names, &FILES_TSV_RE)?;

        let mut index = Self::default();
        for path in &names {
            if let Some(caps) = IMAGE_FILE_RE.captures(path) {
                if let Some(id) = image_ids.get(&caps[1]) {
                    index
                        .images
                        .insert(id.clone(), LocalFile::new(Arc::clone(&source), path, &caps[1]));
                }
            }
            if let Some(caps) = THUMB_FILE_RE.captures(path) {
                index.images.insert(
                    caps[2].to_string(),
                    LocalFile::new(Arc::clone(&source), path, &caps[1]),
                );
            }
            if let Some(caps) = OTHER_FILE_RE.captures(path) {
                if let Some(id) = file_ids.get(&caps[1]) {
                    index
                        .files
                        .insert(id.clone(), LocalFile::new(Arc::clone(&source), path, &caps[1]));
                }
            }
        }

        info!(
            subsystem = "restore",
            component = "media_index",
            op = "build",
            images = index.images.len(),
            files = index.files.len(),
            "Indexed bundled media"
        );
        Ok(index)
    }

    /// Add `<id>.mp3` files of a secondary archive; ids already known win.
    pub fn add_mp3_archive(&mut self, source: Arc<dyn ArchiveSource>) {
        let mut added = 0usize;
        for path in source.file_names() {
            let Some(caps) = MP3_FILE_RE.captures(&path) else {
                continue;
            };
            let id = caps[1].to_string();
            if self.files.contains_key(&id) {
                continue;
            }
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            self.files
                .insert(id, LocalFile::new(Arc::clone(&source), &path, &name));
            added += 1;
        }
        info!(
            subsystem = "restore",
            component = "media_index",
            op = "add_mp3",
            added,
            "Indexed MP3 archive"
        );
    }
}

fn read_tsv(
    source: &dyn ArchiveSource,
    names: &[String],
    re: &Regex,
) -> Result<HashMap<String, String>> {
    match names.iter().find(|n| re.is_match(n)) {
        Some(name) => {
            let data = source.read(name)?;
            Ok(parse_tsv(&String::from_utf8_lossy(&data)))
        }
        None => Ok(HashMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::zip_source;

    #[test]
    fn test_media_id() {
        assert_eq!(media_id("http://m.friendfeed-media.com/0a1b2c"), Some("0a1b2c"));
        assert_eq!(media_id("http://example.com/page.html"), None);
        // Any trailing hex run counts, even a single letter.
        assert_eq!(media_id("http://example.com/page"), Some("e"));
    }

    #[test]
    fn test_parse_tsv_skips_bad_lines() {
        let map = parse_tsv(
            "http://m.friendfeed-media.com/abc123\tphoto.jpg\nno tab here\nhttp://x.com/NOHEX\tx.png\n",
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("photo.jpg").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn test_build_index() {
        let source: Arc<dyn ArchiveSource> = Arc::new(zip_source(&[
            (
                "alice/_json/data/images.tsv",
                b"http://m.friendfeed-media.com/aa11\tcat.jpg\n",
            ),
            (
                "alice/_json/data/files.tsv",
                b"http://m.friendfeed-media.com/ff00\treport.pdf\n",
            ),
            ("alice/images/media/cat.jpg", b"JPEG"),
            ("alice/images/media/dog.jpg", b"JPEG"),
            ("alice/images/media/thumbnails/bb22-thumb.jpg", b"JPEG"),
            ("alice/files/report.pdf", b"%PDF"),
        ]));

        let index = MediaIndex::build(source).unwrap();

        assert_eq!(index.images.len(), 2);
        assert_eq!(index.images["aa11"].name, "cat.jpg");
        assert_eq!(index.images["bb22"].name, "bb22-thumb.jpg");
        assert_eq!(index.images["aa11"].read().unwrap(), b"JPEG");
        assert_eq!(index.files["ff00"].name, "report.pdf");
        assert_eq!(index.files["ff00"].size(), 4);
    }

    #[test]
    fn test_mp3_archive_does_not_override() {
        let main: Arc<dyn ArchiveSource> = Arc::new(zip_source(&[
            ("alice/_json/data/files.tsv", b"http://m.friendfeed-media.com/cc33\tsong.mp3\n"),
            ("alice/files/song.mp3", b"main"),
        ]));
        let mp3: Arc<dyn ArchiveSource> = Arc::new(zip_source(&[
            ("mp3/cc33.mp3", b"secondary"),
            ("mp3/dd44.mp3", b"secondary"),
            ("mp3/readme.txt", b""),
        ]));

        let mut index = MediaIndex::build(main).unwrap();
        index.add_mp3_archive(mp3);

        assert_eq!(index.files.len(), 2);
        assert_eq!(index.files["cc33"].read().unwrap(), b"main");
        assert_eq!(index.files["dd44"].name, "dd44.mp3");
    }
}
