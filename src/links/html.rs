use regex::Regex;
use std::sync::LazyLock;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid HTML pattern {pattern:?}: {e}"))
}

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<script\b.*?</script\s*>"));
static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<style\b.*?</style\s*>"));
static TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]*>"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));

/// Decoded in this order, so `&amp;lt;` ends up as `<`.
const ENTITIES: [(&str, &str); 6] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#039;", "'"),
    ("&nbsp;", " "),
];

/// Reduce an HTML document to plain text: script and style blocks dropped,
/// tags replaced by spaces, whitespace collapsed, a handful of entities
/// decoded. The result may be empty.
pub fn extract_text_from_html(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, " ");
    let text = STYLE_BLOCK.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");

    ENTITIES
        .iter()
        .fold(text.trim().to_string(), |acc, (entity, plain)| {
            acc.replace(entity, plain)
        })
}
