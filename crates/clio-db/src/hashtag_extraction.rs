//! Hashtag extraction from plain-text post and comment bodies.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that may not appear inside a hashtag word: controls, spaces,
/// ASCII and Latin-1 punctuation, multiplication and division signs.
const HASHTAG_WORD: &str = r"[^\x{0000}-\x{0020}\x{007F}\x{0080}-\x{00A0}\x{0021}-\x{002F}\x{003A}-\x{0040}\x{005B}-\x{0060}\x{007B}-\x{007E}\x{00A1}-\x{00BF}\x{00D7}\x{00F7}\x{2000}\x{206F}]+";

static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:^|[^/?0-9A-Za-z_])#({word}(?:[_-]{word})*)",
        word = HASHTAG_WORD
    ))
    .unwrap()
});

/// Extract hashtags from text.
///
/// Returns lowercase, deduplicated tag names in sorted order. A `#` directly
/// after a word character, `/` or `?` does not start a hashtag, so URL
/// fragments are not picked up.
///
/// # Examples
///
/// ```
/// use clio_db::extract_hashtags;
///
/// let tags = extract_hashtags("Dinner #Food #food-pics");
/// assert_eq!(tags, vec!["food".to_string(), "food-pics".to_string()]);
/// ```
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let tags: BTreeSet<String> = HASHTAG_RE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect();
    tags.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str, expected: &[&str]) {
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        assert_eq!(extract_hashtags(text), expected, "text: {:?}", text);
    }

    #[test]
    fn test_single_tag() {
        check("#abc", &["abc"]);
    }

    #[test]
    fn test_duplicates_collapse() {
        check("#abc #abc", &["abc"]);
        check("#abc#abc", &["abc"]);
    }

    #[test]
    fn test_separators() {
        check("#abc #bca", &["abc", "bca"]);
        check("#abc,#bca", &["abc", "bca"]);
    }

    #[test]
    fn test_joined_words_and_unicode() {
        check("#abc-bca #кошки_мышки #2", &["2", "abc-bca", "кошки_мышки"]);
    }

    #[test]
    fn test_case_folding() {
        check("#abC #aBC", &["abc"]);
        check("#AbC and #abc", &["abc"]);
    }

    #[test]
    fn test_not_after_word_character() {
        check("12#abC", &[]);
    }

    #[test]
    fn test_url_fragments_ignored() {
        check("http://example.com/a#abC", &[]);
        check("http://example.com/#abC", &[]);
        check("http://example.com/?#abC", &[]);
    }

    #[test]
    fn test_trailing_punctuation_excluded() {
        check("great day (#sun).", &["sun"]);
    }

    #[test]
    fn test_no_hashtags() {
        check("plain text, no tags # here", &[]);
    }
}
