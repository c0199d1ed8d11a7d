use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;

const PREFIX_PATTERNS: [&str; 4] = ["sk-", "syt_", "ghp_", "hf_"];

const MARKER_PATTERNS: [&str; 6] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "api_key=",
    "access_token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn token_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|(_, c)| !is_secret_char(*c))
        .map_or(input.len(), |(i, _)| from + i)
}

fn scrub_after_marker(scrubbed: &mut String, marker: &str) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let content_start = start + marker.len();
        let end = token_end(scrubbed, content_start);

        // Bare marker without a value.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        scrubbed.replace_range(start..end, "[REDACTED]");
        search_from = start + "[REDACTED]".len();
    }
}

/// Redact API keys and access tokens from text that is about to be logged or
/// posted into a room.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let needs_scrubbing = PREFIX_PATTERNS
        .iter()
        .chain(MARKER_PATTERNS.iter())
        .any(|pattern| input.contains(pattern));
    if !needs_scrubbing {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for pattern in PREFIX_PATTERNS.iter().chain(MARKER_PATTERNS.iter()) {
        scrub_after_marker(&mut scrubbed, pattern);
    }
    Cow::Owned(scrubbed)
}

/// Scrub secrets and cap length of an upstream error body.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    match scrubbed.char_indices().nth(MAX_API_ERROR_CHARS) {
        Some((idx, _)) => format!("{}...", &scrubbed[..idx]),
        None => scrubbed.into_owned(),
    }
}
