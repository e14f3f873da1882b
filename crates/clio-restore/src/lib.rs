//! # clio-restore
//!
//! Restores a FriendFeed ("clio") archive into a FreeFeed database.
//!
//! Entries are read from the archive zip in order, normalized to plain
//! text, and each one is written in its own transaction together with its
//! comments, likes and attachments. Re-running the tool skips entries that
//! were already restored.
//!
//! ## Pipeline
//!
//! ```text
//! archive ─> entry ─> importer ─┬─> resolver ─> thumbnails / files ─> store
//!                               └─> clio-db repositories
//! ```

pub mod app;
pub mod archive;
pub mod config;
pub mod entry;
pub mod fetch;
pub mod files;
pub mod images;
pub mod importer;
pub mod media_index;
pub mod resolver;
pub mod storage;
pub mod testing;
pub mod thumbnails;
pub mod transcoder;

pub use app::{Restorer, RunSummary, Services};
pub use importer::{EntryImporter, RestoreOutcome};
pub use resolver::{AttachmentResolver, PreparedAttachment, PreparedAttachments};
