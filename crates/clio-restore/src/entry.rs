//! Normalization of raw archive records into [`ArchiveEntry`] values.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use clio_core::{
    ArchiveEntry, Comment, DeHtml, Like, RawEntry, RemoteFetcher, Result, ViaSource,
};
use clio_db::extract_hashtags;

static TWITTER_STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(http://twitter\.com/\w+)/statuses").unwrap());

/// Via source of an entry plus the tweet URL when the via pointed at one.
pub fn normalize_via(via: Option<ViaSource>) -> (ViaSource, Option<String>) {
    let Some(mut via) = via.filter(|v| !v.url.is_empty()) else {
        return (ViaSource::direct(), None);
    };
    let status_url = match TWITTER_STATUS_RE.captures(&via.url) {
        Some(caps) => {
            let status = via.url.clone();
            via.url = caps[1].to_string();
            Some(status)
        }
        None => None,
    };
    (via, status_url)
}

/// Convert entry markup to plain text, expanding shortened links.
pub async fn render_body(html: &str, fetcher: &dyn RemoteFetcher) -> Result<(String, Vec<String>)> {
    let parsed = DeHtml::parse(html)?;
    let mut expanded = HashMap::new();
    for link in parsed.short_links() {
        let target = unshorten(&link, fetcher).await;
        expanded.insert(link, target);
    }
    Ok(parsed.render(|href| expanded.get(href).cloned().unwrap_or_else(|| href.to_string())))
}

/// Final target of a shortened link, or the link itself when it cannot be
/// resolved.
pub async fn unshorten(url: &str, fetcher: &dyn RemoteFetcher) -> String {
    // b23.ru moved to z23.ru
    let request_url = url.replacen("://b23.ru/", "://z23.ru/", 1);
    match fetcher.resolve_redirects(&request_url).await {
        Ok(target) => {
            debug!(
                subsystem = "restore",
                component = "entry",
                op = "unshorten",
                url,
                target = %target,
                "Expanded short link"
            );
            target
        }
        Err(e) => {
            warn!(
                subsystem = "restore",
                component = "entry",
                op = "unshorten",
                url,
                error = %e,
                "Cannot expand short link"
            );
            url.to_string()
        }
    }
}

/// Build the importable form of a raw record.
pub async fn normalize(raw: RawEntry, fetcher: &dyn RemoteFetcher) -> Result<ArchiveEntry> {
    let (via, status_url) = normalize_via(raw.via);

    let (mut body, mut links) = render_body(&raw.body, fetcher).await?;
    if let Some(status_url) = status_url {
        body.push_str(" - ");
        body.push_str(&status_url);
        links.push(status_url);
    }
    let hashtags = extract_hashtags(&body);

    let mut comments = Vec::with_capacity(raw.comments.len());
    for c in raw.comments {
        let (text, _) = render_body(&c.body, fetcher).await?;
        comments.push(Comment {
            date: c.date,
            author: c.from.username,
            hashtags: extract_hashtags(&text),
            body: text,
        });
    }

    let likes = raw
        .likes
        .into_iter()
        .map(|l| Like {
            date: l.date,
            author: l.from.username,
        })
        .collect();

    Ok(ArchiveEntry {
        name: raw.name,
        url: raw.url,
        date: raw.date,
        body,
        author: raw.from.username,
        via,
        thumbnails: raw.thumbnails,
        files: raw.files,
        comments,
        likes,
        hashtags,
        links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use clio_core::Error;

    fn raw(json: &str) -> RawEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_empty_via_is_direct() {
        let (via, status) = normalize_via(None);
        assert!(via.is_direct());
        assert_eq!(status, None);

        let (via, _) = normalize_via(Some(ViaSource {
            url: String::new(),
            name: "x".into(),
        }));
        assert!(via.is_direct());
    }

    #[test]
    fn test_twitter_via_is_collapsed_to_user() {
        let (via, status) = normalize_via(Some(ViaSource {
            url: "http://twitter.com/alice/statuses/12345".into(),
            name: "Twitter".into(),
        }));
        assert_eq!(via.url, "http://twitter.com/alice");
        assert_eq!(via.name, "Twitter");
        assert_eq!(status.as_deref(), Some("http://twitter.com/alice/statuses/12345"));
    }

    #[tokio::test]
    async fn test_normalize_entry() {
        let fetcher = FakeFetcher::default()
            .with_redirect("http://bit.ly/abc", "http://example.com/long/page");
        let entry = normalize(
            raw(r##"{
                "name": "e/0123abcd",
                "url": "http://friendfeed.com/alice/0123abcd/hello",
                "date": "2009-05-01T10:00:00Z",
                "body": "Look #Cats <a href=\"http://bit.ly/abc\">http://bit.ly/abc</a> &amp; more",
                "from": {"id": "alice", "type": "user"},
                "via": {"url": "http://twitter.com/alice/statuses/42", "name": "Twitter"},
                "comments": [
                    {"date": "2009-05-02T10:00:00Z", "from": {"id": "bob"}, "body": "so #cute"}
                ],
                "likes": [{"date": "2009-05-03T10:00:00Z", "from": {"id": "carol"}}]
            }"##),
            &fetcher,
        )
        .await
        .unwrap();

        assert_eq!(
            entry.body,
            "Look #Cats http://example.com/long/page & more - http://twitter.com/alice/statuses/42"
        );
        assert_eq!(
            entry.links,
            vec![
                "http://example.com/long/page".to_string(),
                "http://twitter.com/alice/statuses/42".to_string()
            ]
        );
        assert_eq!(entry.hashtags, vec!["cats".to_string()]);
        assert_eq!(entry.via.url, "http://twitter.com/alice");
        assert_eq!(entry.author, "alice");
        assert_eq!(entry.comments[0].author, "bob");
        assert_eq!(entry.comments[0].hashtags, vec!["cute".to_string()]);
        assert_eq!(entry.likes[0].author, "carol");
    }

    #[tokio::test]
    async fn test_unshorten_failure_keeps_link() {
        let fetcher = FakeFetcher::default();
        assert_eq!(unshorten("http://bit.ly/gone", &fetcher).await, "http://bit.ly/gone");
    }

    #[tokio::test]
    async fn test_unshorten_rewrites_b23() {
        let fetcher =
            FakeFetcher::default().with_redirect("http://z23.ru/x1", "http://example.com/");
        assert_eq!(unshorten("http://b23.ru/x1", &fetcher).await, "http://example.com/");
    }

    #[tokio::test]
    async fn test_unexpected_markup_is_rejected() {
        let fetcher = FakeFetcher::default();
        let err = normalize(
            raw(r#"{
                "name": "e/1",
                "date": "2009-05-01T10:00:00Z",
                "body": "<b>bold</b>",
                "from": {"id": "alice"}
            }"#),
            &fetcher,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
