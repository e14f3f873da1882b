//! Collaborator traits of the restore pipeline.
//!
//! The importer talks to the archive, the network, the attachment store and
//! the image transcoder only through these traits, so each of them can be
//! replaced by an in-memory double in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ImageKind;

// =============================================================================
// ARCHIVE
// =============================================================================

/// Read access to the files of an archive.
pub trait ArchiveSource: Send + Sync {
    /// Names of all files in the archive, in archive order.
    fn file_names(&self) -> Vec<String>;

    /// Full content of the named file.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Uncompressed size of the named file, if present.
    fn size(&self, name: &str) -> Option<u64>;
}

// =============================================================================
// NETWORK
// =============================================================================

/// Successful response body of a remote fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedBody {
    /// Media type without parameters, lowercased.
    pub content_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// GET `url`; any status other than 200 is an error.
    async fn get(&self, url: &str) -> Result<FetchedBody>;

    /// Follow redirects of a HEAD request and return the final URL.
    async fn resolve_redirects(&self, url: &str) -> Result<String>;
}

// =============================================================================
// ATTACHMENT STORE
// =============================================================================

/// Durable storage of attachment payloads.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Write `data` under `path`, replacing any previous object.
    ///
    /// `display_name` is the user-facing file name served with the object.
    async fn put(&self, path: &str, data: &[u8], content_type: &str, display_name: &str)
        -> Result<()>;
}

// =============================================================================
// IMAGE TRANSCODER
// =============================================================================

/// External image processing.
#[async_trait]
pub trait ImageTranscoder: Send + Sync {
    /// Apply EXIF orientation to a JPEG and return the upright JPEG.
    async fn reorient(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Scale the image to exactly `width` x `height`, keeping its format.
    ///
    /// An empty result means the variant could not be produced.
    async fn resize(&self, data: &[u8], kind: ImageKind, width: u32, height: u32)
        -> Result<Vec<u8>>;
}
