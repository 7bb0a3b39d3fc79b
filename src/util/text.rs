use std::sync::OnceLock;

use regex::Regex;

/// Ellipsis string appended when a summary is truncated
const ELLIPSIS: &str = "...";

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    // Tag-pattern removal, deliberately not a full HTML parser: feed content
    // is untrusted and only needs to become readable plain text
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("hardcoded pattern compiles"))
}

fn whitespace_pattern() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("hardcoded pattern compiles"))
}

/// Strip HTML tags and collapse the leftover whitespace runs.
///
/// Block-level tags turn into the whitespace that surrounded them, so a
/// `<p>a</p><p>b</p>` body comes out as `"a b"`, not `"ab"` glued together.
pub fn strip_tags(html: &str) -> String {
    let stripped = tag_pattern().replace_all(html, " ");
    whitespace_pattern()
        .replace_all(stripped.trim(), " ")
        .into_owned()
}

/// Produce a plain-text summary of HTML content: tags stripped, whitespace
/// collapsed, truncated to `max_chars` characters with an ellipsis marker
/// appended when anything was cut off.
pub fn summarize(html: &str, max_chars: usize) -> String {
    let text = strip_tags(html);

    if text.chars().count() <= max_chars {
        return text;
    }

    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}
