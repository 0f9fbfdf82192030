//! Title candidates from reader output and raw HTML.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<title>([^<]+)</title>").expect("title pattern is valid"));

/// Title line (`# ...`) at the top of reader output.
pub fn reader_title(reader_content: &str) -> Option<String> {
    let first = reader_content.lines().next()?;
    let title = first.strip_prefix("# ")?.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// First `<title>` element of raw HTML, matched case-insensitively.
pub fn html_title(raw: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(raw);
    HTML_TITLE_RE
        .captures(&html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}
