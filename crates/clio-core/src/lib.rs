//! # clio-core
//!
//! Core types, traits, and abstractions for restoring a FriendFeed ("clio")
//! archive into a FreeFeed database.
//!
//! This crate provides the archive data model, the account and via-source
//! value objects, the error taxonomy, and the collaborator traits that the
//! database and restore crates depend on.

pub mod defaults;
pub mod dehtml;
pub mod error;
pub mod exif;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use dehtml::{de_html, is_short_link, DeHtml};
pub use error::{Error, Result};
pub use exif::{jpeg_orientation, needs_reorientation};
pub use models::*;
pub use traits::*;
