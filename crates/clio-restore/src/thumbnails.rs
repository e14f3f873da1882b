//! Decides which images to fetch for an entry's thumbnails.
//!
//! Thumbnails are previews pointing at the real media. Rules below are tried
//! in order; the first one that returns `Some` decides the whole entry.
//!
//! | # | Rule | Matches |
//! |---|------|---------|
//! | 1 | `known_hosts` | every thumbnail is bundled media, an entry link, twitpic or imgur |
//! | 2 | `dead_service` | via source no longer exists |
//! | 3 | `bookmarklet` | direct or bookmarklet post whose thumbnails all preview one link |
//! | 4 | `yandex_fotki` | via Yandex.Fotki |
//! | 5 | `picasa` | via Picasa Web Albums |
//! | 6 | `redundant_preview` | a lone thumbnail of a video or gallery already linked in the body |
//! | 7 | `fallback` | everything else, per thumbnail |
//!
//! Planning is pure; fetching happens in [`crate::resolver`].

use once_cell::sync::Lazy;
use regex::Regex;

use clio_core::defaults::{BOOKMARKLET_VIA_URL, DEFAULT_VIA_URL};
use clio_core::{ArchiveEntry, Thumbnail};

pub static FF_MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"http://(?:(?:m\.)?friendfeed-media\.com|i\.friendfeed\.com)/([0-9a-f]+)").unwrap()
});
static IMGUR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http://(?:i\.)?imgur\.com/(\w+?)s\.jpg").unwrap());
static PICASA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http://lh\d+\.ggpht\.com/").unwrap());
static INSTAGRAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http://[^/]+\.instagram\.com/").unwrap());
static SOUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http://asset-\w\.soup\.io/asset/").unwrap());
static FLICKR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^/]+\.static\.?flickr\.com/.+_[a-z]\.jpg").unwrap());

const TWITPIC_THUMB_PREFIX: &str = "http://twitpic.com/show/thumb/";
const ENTRY_LINK_PREFIX: &str = "http://friendfeed.com/e/";
const DEAD_VIA_PREFIXES: &[&str] = &[
    "http://filmfeed.ru/users/",
    "http://www.zooomr.com/",
    "http://meme.yahoo.com/",
];

/// One image to produce. Candidates are tried in order; if all fail and an
/// oEmbed page is set, the image URL it names is tried last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRequest {
    pub candidates: Vec<String>,
    pub oembed_page: Option<String>,
}

impl ImageRequest {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            candidates: vec![url.into()],
            oembed_page: None,
        }
    }

    pub fn urls(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            candidates: urls.into_iter().collect(),
            oembed_page: None,
        }
    }
}

/// Outcome of the cascade for one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailPlan {
    /// Name of the deciding rule, `"none"` for entries without thumbnails.
    pub rule: &'static str,
    pub requests: Vec<ImageRequest>,
    /// Text to append to the post body.
    pub body_suffix: Option<String>,
}

/// State a rule may leave for later rules.
#[derive(Debug, Default)]
pub struct PlanContext {
    pub body_suffix: Option<String>,
}

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&ArchiveEntry, &mut PlanContext) -> Option<Vec<ImageRequest>>,
}

/// The cascade, in evaluation order.
pub const RULES: &[Rule] = &[
    Rule { name: "known_hosts", apply: known_hosts },
    Rule { name: "dead_service", apply: dead_service },
    Rule { name: "bookmarklet", apply: bookmarklet },
    Rule { name: "yandex_fotki", apply: yandex_fotki },
    Rule { name: "picasa", apply: picasa },
    Rule { name: "redundant_preview", apply: redundant_preview },
    Rule { name: "fallback", apply: fallback },
];

pub fn plan_thumbnails(entry: &ArchiveEntry) -> ThumbnailPlan {
    if entry.thumbnails.is_empty() {
        return ThumbnailPlan {
            rule: "none",
            ..ThumbnailPlan::default()
        };
    }

    let mut ctx = PlanContext::default();
    for rule in RULES {
        if let Some(requests) = (rule.apply)(entry, &mut ctx) {
            return ThumbnailPlan {
                rule: rule.name,
                requests,
                body_suffix: ctx.body_suffix,
            };
        }
    }
    // `fallback` always matches.
    ThumbnailPlan {
        rule: "fallback",
        requests: Vec::new(),
        body_suffix: ctx.body_suffix,
    }
}

pub fn is_ff_media(url: &str) -> bool {
    FF_MEDIA_RE.is_match(url)
}

fn imgur_full_size(url: &str) -> Option<String> {
    IMGUR_RE
        .captures(url)
        .map(|caps| format!("http://i.imgur.com/{}.jpg", &caps[1]))
}

fn twitpic_large(url: &str) -> String {
    url.replacen("/thumb/", "/large/", 1)
}

/// `s` without its last `n` characters.
fn drop_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &s[..idx],
        _ if n == 0 => s,
        _ => "",
    }
}

fn any_link_starts_with(entry: &ArchiveEntry, prefixes: &[&str]) -> bool {
    entry
        .links
        .iter()
        .any(|l| prefixes.iter().any(|p| l.starts_with(p)))
}

// =============================================================================
// RULES
// =============================================================================

fn known_hosts(entry: &ArchiveEntry, _: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    let all_known = entry.thumbnails.iter().all(|t| {
        is_ff_media(&t.link)
            || t.link.starts_with(ENTRY_LINK_PREFIX)
            || t.url.starts_with(TWITPIC_THUMB_PREFIX)
            || IMGUR_RE.is_match(&t.url)
    });
    if !all_known {
        return None;
    }

    // Each check stands alone: one thumbnail may yield several images.
    let mut requests = Vec::new();
    for t in &entry.thumbnails {
        if is_ff_media(&t.link) {
            requests.push(ImageRequest::url(&t.link));
        }
        if t.url.starts_with(TWITPIC_THUMB_PREFIX) {
            requests.push(ImageRequest::url(twitpic_large(&t.url)));
        }
        if let Some(full) = imgur_full_size(&t.url) {
            requests.push(ImageRequest::url(full));
        }
    }
    Some(requests)
}

fn dead_service(entry: &ArchiveEntry, _: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    DEAD_VIA_PREFIXES
        .iter()
        .any(|p| entry.via.url.starts_with(p))
        .then(Vec::new)
}

fn bookmarklet(entry: &ArchiveEntry, ctx: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    if entry.via.url != BOOKMARKLET_VIA_URL && entry.via.url != DEFAULT_VIA_URL {
        return None;
    }
    let first_link = &entry.thumbnails.first()?.link;
    let same_link = entry.thumbnails.iter().all(|t| &t.link == first_link);
    let local_thumbs = entry.thumbnails.iter().all(|t| is_ff_media(&t.url));
    if !(same_link && local_thumbs) {
        return None;
    }

    if !entry.has_link(first_link) {
        ctx.body_suffix = Some(format!(" - {}", first_link));
    }
    // Instagram previews are handled by later rules.
    if INSTAGRAM_RE.is_match(first_link) {
        return None;
    }
    Some(
        entry
            .thumbnails
            .iter()
            .map(|t| ImageRequest::url(&t.url))
            .collect(),
    )
}

fn yandex_fotki(entry: &ArchiveEntry, _: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    if !entry.via.url.starts_with("http://fotki.yandex.ru/users/") {
        return None;
    }
    Some(
        entry
            .thumbnails
            .iter()
            .filter(|t| {
                t.url.starts_with("http://img-fotki.yandex.ru/get/")
                    && t.link.starts_with("http://fotki.yandex.ru/users/")
            })
            .map(|t| ImageRequest::url(format!("{}orig", drop_chars(&t.url, 1))))
            .collect(),
    )
}

fn picasa(entry: &ArchiveEntry, _: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    if !entry.via.url.starts_with("http://picasaweb.google.com/") {
        return None;
    }
    // Only pictures that are linked from the body, in full size.
    Some(
        entry
            .thumbnails
            .iter()
            .filter(|t| PICASA_RE.is_match(&t.url) && entry.has_link(&t.link))
            .map(|t| ImageRequest::url(t.url.replacen("/s144/", "/", 1)))
            .collect(),
    )
}

fn redundant_preview(entry: &ArchiveEntry, _: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    let [thumb] = entry.thumbnails.as_slice() else {
        return None;
    };
    let link = thumb.link.as_str();

    let redundant = link.starts_with("http://www.youtube.com/watch")
        || (link.starts_with("http://vimeo.com/") && entry.has_link(link))
        || (INSTAGRAM_RE.is_match(link)
            && any_link_starts_with(entry, &["http://instagr.am/p/", "http://instagram.com/p/"]))
        || (link.starts_with("http://behance.vo.llnwd.net/")
            && any_link_starts_with(entry, &["http://www.behance.net/gallery/"]))
        || (link.starts_with("http://b.vimeocdn.com/ts/")
            && any_link_starts_with(entry, &["http://vimeo.com/", "https://vimeo.com/"]));

    redundant.then(Vec::new)
}

fn fallback(entry: &ArchiveEntry, _: &mut PlanContext) -> Option<Vec<ImageRequest>> {
    Some(entry.thumbnails.iter().filter_map(fallback_request).collect())
}

fn fallback_request(t: &Thumbnail) -> Option<ImageRequest> {
    if is_ff_media(&t.link) {
        Some(ImageRequest::url(&t.link))
    } else if t.has_player() {
        None
    } else if t.url.starts_with(TWITPIC_THUMB_PREFIX) {
        Some(ImageRequest::url(twitpic_large(&t.url)))
    } else if t.link.starts_with("http://pbs.twimg.com/media/") {
        Some(ImageRequest::urls([format!("{}:large", t.link), t.url.clone()]))
    } else if let Some(full) = imgur_full_size(&t.url) {
        Some(ImageRequest::url(full))
    } else if SOUP_RE.is_match(&t.url) {
        Some(ImageRequest::url(t.url.replacen("_400.gif", ".gif", 1)))
    } else if FLICKR_RE.is_match(&t.url) {
        // "_s.jpg" is the small square; "_b.jpg" the large size
        Some(ImageRequest {
            candidates: vec![format!("{}_b.jpg", drop_chars(&t.url, 6))],
            oembed_page: Some(t.link.clone()),
        })
    } else {
        Some(ImageRequest::urls([t.link.clone(), t.url.clone()]))
    }
}
