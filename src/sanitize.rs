// src/sanitize.rs
// Naive HTML handling for source content. Messaging channels accept only a
// tiny tag subset, so we keep line structure and drop everything else.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Flatten HTML to plain text: `<br>` becomes a newline, `<p>` a paragraph
/// break, all remaining tags are stripped and entities decoded. Never fails.
pub fn sanitize(raw: &str) -> String {
    let mut out = raw
        .replace("<br />", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .replace("<p>", "\n\n")
        .replace("</p>", "");

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = html_escape::decode_html_entities(&out).to_string();
    out.trim().to_string()
}

/// Escape text for HTML-mode messages.
pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}
