//! Structured logging field name constants for clio-restore.
//!
//! All crates use these constants for consistent structured logging fields,
//! so a restore run's log stream can be filtered by entry or attachment.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | The run is aborting; the failing entry was rolled back |
//! | WARN  | Recoverable per-item issue, the item was skipped |
//! | INFO  | Lifecycle events, per-entry progress, created posts |
//! | DEBUG | Rule decisions, per-attachment details, cache misses |
//! | TRACE | Per-candidate URL attempts |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "restore", "db", "media", "storage", "transcode"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "importer", "thumbnails", "files", "accounts", "via", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "restore_entry", "resolve", "fetch", "resize"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Archive-local entry name.
pub const ENTRY_NAME: &str = "entry_name";

/// Restored post UUID.
pub const POST_ID: &str = "post_id";

/// Attachment UUID.
pub const ATTACHMENT_ID: &str = "attachment_id";

/// Archive-era username.
pub const OLD_USERNAME: &str = "old_username";

/// Media URL being fetched or resolved.
pub const URL: &str = "url";

/// Thumbnail rule that decided an entry's media.
pub const RULE: &str = "rule";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a media payload.
pub const SIZE_BYTES: &str = "size_bytes";

/// Number of attachments produced for an entry.
pub const ATTACHMENT_COUNT: &str = "attachment_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
