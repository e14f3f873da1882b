//! Conversion of archived entry markup to plain text.
//!
//! Archived bodies contain plain text with `<a>` anchors only. Anchors whose
//! text looks like a URL are replaced by the full target (the `title`
//! attribute when present, the `href` otherwise) and reported as links.
//! Any other tag makes the body invalid.
//!
//! Parsing is separated from rendering so callers can resolve shortened
//! hrefs (a network operation) between the two steps.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

/// Hosts of link shorteners whose targets are expanded.
pub const SHORT_LINK_DOMAINS: &[&str] = &[
    "t.co",
    "bit.ly",
    "bitly.com",
    "bitly.is",
    "j.mp",
    "goo.gl",
    "tinyurl.com",
    "ow.ly",
    "b23.ru",
];

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^>\x22']|\x22[^\x22]*\x22|'[^']*')*)>").unwrap());

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#[xX]([0-9a-fA-F]+)|#([0-9]+)|([A-Za-z]+));").unwrap());

static URL_LIKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(https?|ftp)://").unwrap());

/// A piece of parsed markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Anchor {
        text: String,
        title: String,
        href: String,
    },
}

/// Parsed entry markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeHtml {
    segments: Vec<Segment>,
}

impl DeHtml {
    /// Tokenize `text`, rejecting any tag other than `<a>`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut anchor: Option<(String, String, String)> = None;
        let mut pos = 0;

        for caps in TAG_RE.captures_iter(text) {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(pos..pos);
            push_text(&mut segments, &mut anchor, &text[pos..whole.start]);
            pos = whole.end;

            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();

            if closing {
                if let Some((text, title, href)) = anchor.take() {
                    segments.push(Segment::Anchor { text, title, href });
                }
                continue;
            }

            if name != "a" {
                return Err(Error::InvalidInput(format!("unexpected HTML tag {:?}", name)));
            }

            // An unclosed anchor is flushed when the next one starts.
            if let Some((text, title, href)) = anchor.take() {
                segments.push(Segment::Anchor { text, title, href });
            }

            let mut title = String::new();
            let mut href = String::new();
            for attr in ATTR_RE.captures_iter(caps.get(3).map(|m| m.as_str()).unwrap_or("")) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map(|m| decode_entities(m.as_str()))
                    .unwrap_or_default();
                match attr[1].to_ascii_lowercase().as_str() {
                    "title" => title = value,
                    "href" => href = value,
                    _ => {}
                }
            }
            anchor = Some((String::new(), title, href));
        }

        push_text(&mut segments, &mut anchor, &text[pos..]);
        if let Some((text, title, href)) = anchor.take() {
            segments.push(Segment::Anchor { text, title, href });
        }

        Ok(Self { segments })
    }

    /// Hrefs that will be rendered as links and point to a link shortener.
    pub fn short_links(&self) -> Vec<String> {
        let mut out = Vec::new();
        for seg in &self.segments {
            if let Segment::Anchor { text, title, href } = seg {
                if URL_LIKE_RE.is_match(text)
                    && title.is_empty()
                    && is_short_link(href)
                    && !out.contains(href)
                {
                    out.push(href.clone());
                }
            }
        }
        out
    }

    /// Produce the plain text and the list of links, passing every rendered
    /// href through `expand`.
    pub fn render(&self, expand: impl Fn(&str) -> String) -> (String, Vec<String>) {
        let mut body = String::new();
        let mut links = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(t) => body.push_str(t),
                Segment::Anchor { text, title, href } => {
                    if !URL_LIKE_RE.is_match(text) {
                        body.push_str(text);
                    } else if !title.is_empty() {
                        body.push_str(title);
                        links.push(title.clone());
                    } else {
                        let url = expand(href);
                        body.push_str(&url);
                        links.push(url);
                    }
                }
            }
        }
        (body, links)
    }
}

fn push_text(
    segments: &mut Vec<Segment>,
    anchor: &mut Option<(String, String, String)>,
    raw: &str,
) {
    if raw.is_empty() {
        return;
    }
    let decoded = decode_entities(raw);
    match anchor {
        Some((text, _, _)) => text.push_str(&decoded),
        None => match segments.last_mut() {
            Some(Segment::Text(t)) => t.push_str(&decoded),
            _ => segments.push(Segment::Text(decoded)),
        },
    }
}

/// Convert markup to plain text and collect its links.
pub fn de_html(text: &str, expand: impl Fn(&str) -> String) -> Result<(String, Vec<String>)> {
    Ok(DeHtml::parse(text)?.render(expand))
}

/// True if `url` points to one of the known link shorteners.
pub fn is_short_link(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| SHORT_LINK_DOMAINS.contains(&h))
            .unwrap_or(false),
        Err(_) => false,
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("nbsp") => Some('\u{a0}'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> (String, Vec<String>) {
        de_html(text, |u| u.to_string()).unwrap()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (body, links) = plain("just text");
        assert_eq!(body, "just text");
        assert!(links.is_empty());
    }

    #[test]
    fn test_entities_are_decoded() {
        let (body, _) = plain("fish &amp; chips &lt;3 &#1082;&#x43E;");
        assert_eq!(body, "fish & chips <3 ко");
    }

    #[test]
    fn test_url_anchor_uses_href() {
        let (body, links) =
            plain(r#"see <a href="http://example.com/long/path" rel="nofollow">http://example.com/lo...</a>!"#);
        assert_eq!(body, "see http://example.com/long/path!");
        assert_eq!(links, vec!["http://example.com/long/path"]);
    }

    #[test]
    fn test_url_anchor_prefers_title() {
        let (body, links) = plain(
            r#"<a href="http://t.co/x" title="http://example.com/full">http://t.co/x</a>"#,
        );
        assert_eq!(body, "http://example.com/full");
        assert_eq!(links, vec!["http://example.com/full"]);
    }

    #[test]
    fn test_non_url_anchor_keeps_text() {
        let (body, links) = plain(r#"hi <a href="http://friendfeed.com/bob">Bob</a>"#);
        assert_eq!(body, "hi Bob");
        assert!(links.is_empty());
    }

    #[test]
    fn test_other_tags_are_rejected() {
        let err = de_html("<b>bold</b>", |u| u.to_string()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("unexpected HTML tag"));
    }

    #[test]
    fn test_expand_is_applied_to_href() {
        let (body, links) = de_html(r#"<a href="http://bit.ly/abc">http://bit.ly/abc</a>"#, |u| {
            if u == "http://bit.ly/abc" {
                "http://example.com/target".to_string()
            } else {
                u.to_string()
            }
        })
        .unwrap();
        assert_eq!(body, "http://example.com/target");
        assert_eq!(links, vec!["http://example.com/target"]);
    }

    #[test]
    fn test_short_links_collected_once() {
        let parsed = DeHtml::parse(
            r#"<a href="http://bit.ly/a">http://bit.ly/a</a> <a href="http://bit.ly/a">http://bit.ly/a</a> <a href="http://example.com/">http://example.com/</a> <a href="http://j.mp/b" title="http://x.org/">http://j.mp/b</a>"#,
        )
        .unwrap();
        assert_eq!(parsed.short_links(), vec!["http://bit.ly/a"]);
    }

    #[test]
    fn test_is_short_link() {
        assert!(is_short_link("http://t.co/abc"));
        assert!(is_short_link("https://bit.ly/x"));
        assert!(is_short_link("http://b23.ru/xyz"));
        assert!(!is_short_link("http://example.com/t.co"));
        assert!(!is_short_link("not a url"));
    }
}
