//! Centralized default constants for clio-restore.
//!
//! Organized by domain area. Values mirror the FreeFeed schema and the
//! layout of FriendFeed archives.

// =============================================================================
// ARCHIVE
// =============================================================================

/// Via URL of entries posted directly on the FriendFeed site.
pub const DEFAULT_VIA_URL: &str = "http://friendfeed.com";

/// Via name of entries posted directly on the FriendFeed site.
pub const DEFAULT_VIA_NAME: &str = "FriendFeed";

/// Via URL of entries posted with the FriendFeed bookmarklet.
pub const BOOKMARKLET_VIA_URL: &str = "http://friendfeed.com/share/bookmarklet";

// =============================================================================
// TARGET SCHEMA
// =============================================================================

/// `comments.hide_type` of a regular comment.
pub const COMMENT_TYPE_VISIBLE: i32 = 0;

/// `comments.hide_type` of a comment kept in the archive side table.
pub const COMMENT_TYPE_HIDDEN: i32 = 3;

/// Placeholder body of hidden comments.
pub const HIDDEN_COMMENT_BODY: &str = "Comment is in archive";

/// `archives.recovery_status`: the user has not asked for a restore.
pub const RECOVERY_NOT_STARTED: i32 = 0;

/// `archives.recovery_status`: the restore was requested and may run.
pub const RECOVERY_STARTED: i32 = 1;

/// `archives.recovery_status`: the archive has been restored.
pub const RECOVERY_FINISHED: i32 = 2;

// =============================================================================
// MEDIA
// =============================================================================

/// Content types accepted from remote image hosts.
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];

/// Directory of original attachments inside the attachment store.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Default timeout for remote media fetches in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 60;

/// Timeout of link unshortening HEAD requests in seconds.
pub const UNSHORTEN_TIMEOUT_SECS: u64 = 10;

/// Default timeout of one transcoder run in seconds.
pub const TRANSCODE_TIMEOUT_SECS: u64 = 120;

/// JPEG quality passed to the transcoder.
pub const JPEG_QUALITY: u32 = 95;
