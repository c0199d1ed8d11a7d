use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+").unwrap_or_else(|e| panic!("invalid URL pattern: {e}"))
});

/// Detect HTTP/HTTPS links in text, in order of appearance.
///
/// Matching is deliberately greedy: everything up to the next whitespace is
/// part of the link, including trailing punctuation or a closing parenthesis.
/// Repeated links are all returned; deduplication is the cache's job.
pub fn detect_links(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
