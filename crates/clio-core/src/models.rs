//! Data model of archive entries, successor accounts and attachments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::defaults::{DEFAULT_VIA_NAME, DEFAULT_VIA_URL};

// =============================================================================
// ARCHIVE RECORDS (as stored in the zip)
// =============================================================================

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reference to an archive-era user (`{"id": "...", "type": "user"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    #[serde(rename = "id")]
    pub username: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// The "posted via" source of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaSource {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
}

impl ViaSource {
    /// The source of entries posted directly on the site.
    pub fn direct() -> Self {
        Self {
            url: DEFAULT_VIA_URL.to_string(),
            name: DEFAULT_VIA_NAME.to_string(),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.url == DEFAULT_VIA_URL
    }
}

/// One row of the per-archive via statistics (`archives.via_sources`).
#[derive(Debug, Clone, Deserialize)]
pub struct ViaStat {
    #[serde(flatten)]
    pub via: ViaSource,
    #[serde(default)]
    pub count: i64,
}

/// Thumbnail of an entry: `url` is the preview image, `link` where it points.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub link: String,
    /// Embedded player markup; thumbnails with a player are video previews.
    #[serde(default)]
    pub player: Option<serde_json::Value>,
}

impl Thumbnail {
    pub fn has_player(&self) -> bool {
        matches!(self.player, Some(ref p) if !p.is_null())
    }
}

/// File attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub date: DateTime<Utc>,
    pub from: UserRef,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLike {
    pub date: DateTime<Utc>,
    pub from: UserRef,
}

/// Entry record exactly as decoded from `_json/data/entries/*.js`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
    pub from: UserRef,
    #[serde(default)]
    pub via: Option<ViaSource>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub thumbnails: Vec<Thumbnail>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<FileRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: Vec<RawComment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub likes: Vec<RawLike>,
}

// =============================================================================
// NORMALIZED ENTRY
// =============================================================================

/// A comment with its body converted to plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub date: DateTime<Utc>,
    pub author: String,
    pub body: String,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub date: DateTime<Utc>,
    pub author: String,
}

/// One imported unit of the archive, immutable once normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    /// Stable archive-local id; the idempotency key.
    pub name: String,
    pub url: Option<String>,
    pub date: DateTime<Utc>,
    /// Plain-text body.
    pub body: String,
    /// Archive username of the author.
    pub author: String,
    pub via: ViaSource,
    pub thumbnails: Vec<Thumbnail>,
    pub files: Vec<FileRef>,
    pub comments: Vec<Comment>,
    pub likes: Vec<Like>,
    pub hashtags: Vec<String>,
    /// Outbound links found in the body.
    pub links: Vec<String>,
}

impl ArchiveEntry {
    /// Latest of the entry date and its comment dates.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.comments
            .iter()
            .map(|c| c.date)
            .fold(self.date, |acc, d| if d > acc { d } else { acc })
    }

    pub fn has_link(&self, link: &str) -> bool {
        self.links.iter().any(|l| l == link)
    }
}

// =============================================================================
// SUCCESSOR ACCOUNTS
// =============================================================================

/// Numeric and UUID identity of a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeedRef {
    pub id: i32,
    pub uid: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFeeds {
    pub posts: FeedRef,
    pub comments: FeedRef,
    pub likes: FeedRef,
}

/// Archive-era user and the successor account it maps to.
///
/// Accounts that never joined the successor service keep `user_id` empty and
/// zero-valued feeds; they are still usable for hidden comments and likes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub old_username: String,
    pub new_username: String,
    pub user_id: Option<Uuid>,
    pub has_archive: bool,
    pub disable_comments: bool,
    pub restore_self_comments: bool,
    pub restore_comments_and_likes: bool,
    pub feeds: AccountFeeds,
}

/// Whether a restored contribution is attributed or redacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Key of a hidden comment or like in the archive side tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiddenOwner {
    UserId(Uuid),
    OldUsername(String),
}

impl Account {
    /// Account object for a username with no successor account.
    pub fn unknown(old_username: &str) -> Self {
        Self {
            old_username: old_username.to_string(),
            ..Self::default()
        }
    }

    /// True if the user exists in the successor service.
    pub fn exists(&self) -> bool {
        self.user_id.is_some()
    }

    /// Visibility of a comment by this account on a post by `post_author`.
    ///
    /// Own comments on own posts are shown only with the explicit
    /// "restore my own comments" opt-in.
    pub fn comment_visibility(&self, post_author: &Account) -> Visibility {
        let own_comment = self.old_username == post_author.old_username;
        if self.restore_comments_and_likes || (own_comment && self.restore_self_comments) {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    pub fn like_visibility(&self) -> Visibility {
        if self.restore_comments_and_likes {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    pub fn hidden_owner(&self) -> HiddenOwner {
        match self.user_id {
            Some(id) => HiddenOwner::UserId(id),
            None => HiddenOwner::OldUsername(self.old_username.clone()),
        }
    }
}

/// Lifetime counters in `user_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Posts,
    Comments,
    Likes,
}

impl StatKind {
    pub fn column(&self) -> &'static str {
        match self {
            StatKind::Posts => "posts_count",
            StatKind::Comments => "comments_count",
            StatKind::Likes => "likes_count",
        }
    }
}

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Image formats accepted as image attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
        }
    }

    /// Output format name understood by GraphicsMagick.
    pub fn gm_format(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Audio,
    General,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Audio => "audio",
            MediaType::General => "general",
        }
    }
}

/// Named target box of an image variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBox {
    pub key: &'static str,
    pub width: u32,
    pub height: u32,
    pub dir: &'static str,
}

/// Variant boxes stored for every image; `o` keeps the source dimensions.
pub const IMAGE_SIZE_BOXES: [SizeBox; 3] = [
    SizeBox {
        key: "o",
        width: 0,
        height: 0,
        dir: "attachments",
    },
    SizeBox {
        key: "t",
        width: 525,
        height: 175,
        dir: "attachments/thumbnails",
    },
    SizeBox {
        key: "t2",
        width: 1050,
        height: 350,
        dir: "attachments/thumbnails2",
    },
];

/// One entry of `attachments.image_sizes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizeRecord {
    pub w: u32,
    pub h: u32,
    pub url: String,
}

pub type ImageSizes = BTreeMap<String, ImageSizeRecord>;

/// Image attachment row, inserted before the post exists.
#[derive(Debug, Clone)]
pub struct NewImageAttachment {
    pub id: Uuid,
    pub ord: i32,
    pub file_name: String,
    pub file_size: i64,
    pub kind: ImageKind,
    pub sizes: ImageSizes,
}

/// Non-image attachment row (audio or generic file).
#[derive(Debug, Clone)]
pub struct NewFileAttachment {
    pub id: Uuid,
    pub ord: i32,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub media_type: MediaType,
    pub extension: String,
    pub user_id: Option<Uuid>,
    pub artist: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn account(name: &str, restore_all: bool, restore_self: bool) -> Account {
        Account {
            old_username: name.to_string(),
            user_id: Some(Uuid::new_v4()),
            restore_comments_and_likes: restore_all,
            restore_self_comments: restore_self,
            ..Account::default()
        }
    }

    #[test]
    fn test_unknown_account_does_not_exist() {
        let acc = Account::unknown("ghost");
        assert!(!acc.exists());
        assert_eq!(acc.feeds.posts.id, 0);
        assert_eq!(acc.hidden_owner(), HiddenOwner::OldUsername("ghost".into()));
    }

    #[test]
    fn test_hidden_owner_prefers_user_id() {
        let acc = account("alice", false, false);
        assert_eq!(acc.hidden_owner(), HiddenOwner::UserId(acc.user_id.unwrap()));
    }

    #[test]
    fn test_comment_on_foreign_post_without_opt_in_is_hidden() {
        let author = account("alice", false, false);
        let commenter = account("bob", false, false);
        assert_eq!(commenter.comment_visibility(&author), Visibility::Hidden);
    }

    #[test]
    fn test_comment_with_opt_in_is_visible() {
        let author = account("alice", false, false);
        let commenter = account("bob", true, false);
        assert_eq!(commenter.comment_visibility(&author), Visibility::Visible);
    }

    #[test]
    fn test_own_comment_requires_self_opt_in() {
        let author = account("alice", false, false);
        assert_eq!(author.comment_visibility(&author), Visibility::Hidden);

        let author = account("alice", false, true);
        assert_eq!(author.comment_visibility(&author), Visibility::Visible);
    }

    #[test]
    fn test_self_opt_in_does_not_apply_to_foreign_posts() {
        let author = account("alice", false, false);
        let commenter = account("bob", false, true);
        assert_eq!(commenter.comment_visibility(&author), Visibility::Hidden);
    }

    #[test]
    fn test_like_visibility() {
        assert_eq!(account("a", true, false).like_visibility(), Visibility::Visible);
        assert_eq!(account("a", false, true).like_visibility(), Visibility::Hidden);
    }

    #[test]
    fn test_raw_entry_null_lists() {
        let json = r#"{
            "name": "e/0a1b2c3d",
            "date": "2009-05-01T10:00:00Z",
            "body": "hello",
            "from": {"id": "alice", "type": "user"},
            "via": null,
            "thumbnails": null,
            "comments": [{"date": "2009-05-01T11:00:00Z", "from": {"id": "bob"}, "body": "hi"}]
        }"#;
        let raw: RawEntry = serde_json::from_str(json).unwrap();
        assert!(raw.thumbnails.is_empty());
        assert!(raw.files.is_empty());
        assert!(raw.likes.is_empty());
        assert!(raw.via.is_none());
        assert_eq!(raw.comments.len(), 1);
        assert_eq!(raw.comments[0].from.username, "bob");
    }

    #[test]
    fn test_thumbnail_player() {
        let t: Thumbnail =
            serde_json::from_str(r#"{"url": "u", "link": "l", "player": "<embed/>"}"#).unwrap();
        assert!(t.has_player());
        let t: Thumbnail = serde_json::from_str(r#"{"url": "u", "link": "l"}"#).unwrap();
        assert!(!t.has_player());
    }

    #[test]
    fn test_updated_at_uses_latest_comment() {
        let date = Utc.with_ymd_and_hms(2009, 5, 1, 10, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2009, 5, 3, 10, 0, 0).unwrap();
        let entry = ArchiveEntry {
            name: "e".into(),
            url: None,
            date,
            body: String::new(),
            author: "alice".into(),
            via: ViaSource::direct(),
            thumbnails: vec![],
            files: vec![],
            comments: vec![Comment {
                date: later,
                author: "bob".into(),
                body: "x".into(),
                hashtags: vec![],
            }],
            likes: vec![],
            hashtags: vec![],
            links: vec![],
        };
        assert_eq!(entry.updated_at(), later);
    }

    #[test]
    fn test_image_kind_names() {
        assert_eq!(ImageKind::Jpeg.extension(), "jpg");
        assert_eq!(ImageKind::Gif.mime_type(), "image/gif");
        assert_eq!(IMAGE_SIZE_BOXES[1].dir, "attachments/thumbnails");
    }
}
