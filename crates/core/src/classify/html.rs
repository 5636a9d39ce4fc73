//! Minimal HTML-to-text cleanup for body columns.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup from an HTML body, leaving whitespace-normalized text.
///
/// Good enough for building a classifier snippet; not an HTML parser.
pub fn strip_html(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }

    let text = SCRIPT_RE.replace_all(input, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    WS_RE.replace_all(&text, " ").trim().to_string()
}
