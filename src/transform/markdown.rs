//! HTML→Markdown conversion (§4.F.2): `html2md` is treated as an external
//! pure-function collaborator; two fixups run on its output — multi-line
//! link text breaks Markdown's `[...]` link syntax unless newlines inside
//! it are escaped, and boilerplate "Skip to Content" anchors (common on
//! accessibility nav skip-links) add no content and are stripped.

use regex::Regex;
use std::sync::OnceLock;

pub fn to_markdown(html: &str) -> String {
    let raw = html2md::parse_html(html);
    let escaped = escape_multiline_link_text(&raw);
    strip_skip_to_content_links(&escaped)
}

/// Rewrites newlines found inside `[...]` link-text spans to literal `\n`
/// so the surrounding brackets stay on one logical Markdown line.
fn escape_multiline_link_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut depth = 0usize;
    let mut chars = markdown.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                depth += 1;
                out.push(c);
            }
            ']' if depth > 0 => {
                depth -= 1;
                out.push(c);
            }
            '\n' if depth > 0 => {
                out.push_str("\\n");
            }
            _ => out.push(c),
        }
    }
    out
}

fn skip_to_content_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[\s*skip to content\s*\]\([^)]*\)\s*").unwrap()
    })
}

/// Removes "[Skip to Content](#...)"-style accessibility skip links, which
/// carry no document content.
fn strip_skip_to_content_links(markdown: &str) -> String {
    skip_to_content_regex().replace_all(markdown, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_heading_and_paragraph() {
        let md = to_markdown("<h1>Title</h1><p>Body text</p>");
        assert!(md.contains("Title"));
        assert!(md.contains("Body text"));
    }

    #[test]
    fn escapes_newlines_inside_link_text() {
        let md = escape_multiline_link_text("[Line one\nLine two](https://example.com)");
        assert_eq!(md, "[Line one\\nLine two](https://example.com)");
    }

    #[test]
    fn strips_skip_to_content_anchor() {
        let md = strip_skip_to_content_links("[Skip to Content](#main)\n\n# Real Title");
        assert!(!md.contains("Skip to Content"));
        assert!(md.contains("# Real Title"));
    }
}
