//! In-memory doubles of the restore collaborators, shared by unit and
//! integration tests.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use clio_core::{
    AttachmentStore, Error, FetchedBody, ImageKind, ImageTranscoder, RemoteFetcher, Result,
};

use crate::archive::ZipArchiveSource;

/// Build an in-memory zip archive with the given files.
pub fn zip_source(files: &[(&str, &[u8])]) -> ZipArchiveSource<Cursor<Vec<u8>>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    let cursor = writer.finish().unwrap();
    ZipArchiveSource::new(Cursor::new(cursor.into_inner())).unwrap()
}

/// A solid-color PNG of the given size.
pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A solid-color baseline JPEG of the given size, without EXIF data.
pub fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// APP1 segment holding a big-endian EXIF block with only an Orientation tag.
pub fn exif_orientation_segment(orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2a");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut segment = vec![0xff, 0xe1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\x00\x00");
    segment.extend_from_slice(&tiff);
    segment
}

/// [`encode_jpeg`] with an EXIF orientation right after the SOI marker.
pub fn encode_jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = encode_jpeg(width, height);
    let mut out = jpeg[..2].to_vec();
    out.extend(exif_orientation_segment(orientation));
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =============================================================================
// FETCHER
// =============================================================================

/// Serves canned responses; unknown URLs fail like a 404.
#[derive(Default)]
pub struct FakeFetcher {
    bodies: HashMap<String, FetchedBody>,
    redirects: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_body(mut self, url: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.bodies.insert(
            url.to_string(),
            FetchedBody {
                content_type: content_type.to_string(),
                data,
            },
        );
        self
    }

    pub fn with_png(self, url: &str, width: u32, height: u32) -> Self {
        self.with_body(url, "image/png", encode_png(width, height))
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, url: &str) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}

#[async_trait]
impl RemoteFetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody> {
        self.record(url);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Request(format!("{}: status 404 Not Found", url)))
    }

    async fn resolve_redirects(&self, url: &str) -> Result<String> {
        self.record(url);
        self.redirects
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Request(format!("{}: connection refused", url)))
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub size: usize,
    pub content_type: String,
    pub display_name: String,
}

/// Remembers every write.
#[derive(Default)]
pub struct RecordingStore {
    puts: Mutex<Vec<StoredObject>>,
}

impl RecordingStore {
    pub fn puts(&self) -> Vec<StoredObject> {
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AttachmentStore for RecordingStore {
    async fn put(&self, path: &str, data: &[u8], content_type: &str, display_name: &str) -> Result<()> {
        self.puts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredObject {
                path: path.to_string(),
                size: data.len(),
                content_type: content_type.to_string(),
                display_name: display_name.to_string(),
            });
        Ok(())
    }
}

// =============================================================================
// TRANSCODER
// =============================================================================

/// Echoes its input, or fails every call when built with [`failing`].
///
/// [`failing`]: ScriptedTranscoder::failing
#[derive(Default)]
pub struct ScriptedTranscoder {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTranscoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Calls so far, as `"reorient"` or `"resize <ext> <w>x<h>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run(&self, call: String, data: &[u8]) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.fail {
            Err(Error::Transcode("scripted failure".to_string()))
        } else {
            Ok(data.to_vec())
        }
    }
}

#[async_trait]
impl ImageTranscoder for ScriptedTranscoder {
    async fn reorient(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.run("reorient".to_string(), data)
    }

    async fn resize(&self, data: &[u8], kind: ImageKind, width: u32, height: u32) -> Result<Vec<u8>> {
        self.run(format!("resize {} {}x{}", kind.extension(), width, height), data)
    }
}
