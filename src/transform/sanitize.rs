//! HTML Sanitizer (§4.H): strips non-content tags (`script`, `style`,
//! `noscript`, etc.), honors caller `includeTags`/`excludeTags`, and keeps
//! only `mainContent` when asked, using the same `scraper` crate the
//! teacher's `scraping/rust_scraper/clean.rs` already pulls in for DOM
//! selection.

use scraper::{Html, Selector};

use crate::model::ScrapeOptions;

/// Tags removed unconditionally: they never carry page content a caller
/// would want in markdown/links/metadata output.
const ALWAYS_STRIP: &[&str] = &["script", "style", "noscript", "meta", "head"];

/// Removed when `onlyMainContent` is set, unless the subtree contains a
/// `forceInclude` selector (§4.H "remove a fixed denylist ... unless
/// subtree contains any forceInclude selector (#main)").
const MAIN_CONTENT_DENYLIST: &[&str] = &[
    "header", "footer", "nav", "aside", ".ad", ".ads", ".advertisement", ".modal", ".popup",
    ".sidebar", ".cookie-banner", ".social-share",
];

const FORCE_INCLUDE: &[&str] = &["#main"];

/// Returns sanitized HTML as a string. Re-parses into a fresh owned tree
/// using node-removal-by-rebuild (the `scraper`/`ego-tree` combination does
/// not expose in-place node deletion), which keeps this a pure function
/// of its input.
pub fn sanitize(parsed: &Html, options: &ScrapeOptions) -> String {
    let mut html = parsed.html();

    for tag in ALWAYS_STRIP {
        html = strip_tag(&html, tag);
    }
    for tag in &options.exclude_tags {
        html = strip_tag(&html, tag);
    }

    // includeTags, when it matches anything, takes the subtree as-is and
    // skips onlyMainContent entirely — it runs against the
    // already-exclude-stripped HTML but *before* the denylist strip, since
    // the denylist (header/nav/aside/...) would otherwise remove the very
    // subtree a caller asked to keep (§4.H).
    if !options.include_tags.is_empty() {
        if let Some(subset) = extract_matching_tags(&html, &options.include_tags) {
            return subset;
        }
    }

    if options.only_main_content {
        html = strip_denylist_unless_force_included(&html);
    }

    html
}

fn strip_tag(html: &str, tag: &str) -> String {
    if tag.contains('*') {
        return strip_tag_wildcard(html, tag);
    }
    let Ok(selector) = Selector::parse(tag) else {
        return html.to_string();
    };
    let doc = Html::parse_document(html);
    let mut fragments: Vec<String> = Vec::new();
    let matched: std::collections::HashSet<_> = doc.select(&selector).map(|e| e.id()).collect();

    // Rebuild by serializing the root while skipping matched subtrees. The
    // `scraper` crate doesn't support node removal directly, so we walk the
    // tree and only emit nodes that are not inside a matched subtree.
    render_excluding(&doc, matched, &mut fragments);
    fragments.join("")
}

/// Handles `excludeTags` patterns like `*ad*` that `Selector::parse` can't
/// express: a substring match against the tag name, its class list, or any
/// attribute value, rather than a CSS selector.
fn strip_tag_wildcard(html: &str, pattern: &str) -> String {
    let needle = pattern.trim_matches('*').to_ascii_lowercase();
    if needle.is_empty() {
        return html.to_string();
    }

    let doc = Html::parse_document(html);
    let matched: std::collections::HashSet<_> = doc
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let element = node.value().as_element()?;
            element_matches_wildcard(element, &needle).then(|| node.id())
        })
        .collect();

    let mut fragments: Vec<String> = Vec::new();
    render_excluding(&doc, matched, &mut fragments);
    fragments.join("")
}

fn element_matches_wildcard(element: &scraper::node::Element, needle: &str) -> bool {
    if element.name().to_ascii_lowercase().contains(needle) {
        return true;
    }
    if let Some(class) = element.attr("class") {
        if class.to_ascii_lowercase().split_whitespace().any(|c| c.contains(needle)) {
            return true;
        }
    }
    element
        .attrs()
        .any(|(_, value)| value.to_ascii_lowercase().contains(needle))
}

fn render_excluding(
    doc: &Html,
    excluded_ids: std::collections::HashSet<ego_tree::NodeId>,
    out: &mut Vec<String>,
) {
    for child in doc.tree.root().children() {
        render_node_excluding(child, &excluded_ids, out);
    }
}

fn render_node_excluding(
    node: ego_tree::NodeRef<scraper::Node>,
    excluded_ids: &std::collections::HashSet<ego_tree::NodeId>,
    out: &mut Vec<String>,
) {
    if excluded_ids.contains(&node.id()) {
        return;
    }
    match node.value() {
        scraper::Node::Element(el) => {
            let name = el.name();
            let attrs: String = el
                .attrs()
                .map(|(k, v)| format!(" {k}=\"{}\"", v.replace('"', "&quot;")))
                .collect();
            out.push(format!("<{name}{attrs}>"));
            for child in node.children() {
                render_node_excluding(child, excluded_ids, out);
            }
            out.push(format!("</{name}>"));
        }
        scraper::Node::Text(text) => out.push(text.to_string()),
        _ => {
            for child in node.children() {
                render_node_excluding(child, excluded_ids, out);
            }
        }
    }
}

/// Strips every `MAIN_CONTENT_DENYLIST` match, skipping any subtree that
/// itself contains a `FORCE_INCLUDE` selector (e.g. `<nav id="main">` stays).
fn strip_denylist_unless_force_included(html: &str) -> String {
    let doc = Html::parse_document(html);

    let force_include_ids: std::collections::HashSet<_> = FORCE_INCLUDE
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .flat_map(|sel| doc.select(&sel).map(|e| e.id()))
        .collect();

    let mut excluded = std::collections::HashSet::new();
    for tag in MAIN_CONTENT_DENYLIST {
        let Ok(selector) = Selector::parse(tag) else { continue };
        for el in doc.select(&selector) {
            let contains_force_include = el
                .descendants()
                .any(|d| force_include_ids.contains(&d.id()));
            if !contains_force_include {
                excluded.insert(el.id());
            }
        }
    }

    let mut fragments = Vec::new();
    render_excluding(&doc, excluded, &mut fragments);
    fragments.join("")
}

fn extract_matching_tags(html: &str, tags: &[String]) -> Option<String> {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    for tag in tags {
        let Ok(selector) = Selector::parse(tag) else { continue };
        for el in doc.select(&selector) {
            out.push_str(&el.html());
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let parsed = Html::parse_document(
            "<html><body><p>keep</p><script>evil()</script></body></html>",
        );
        let sanitized = sanitize(&parsed, &ScrapeOptions::default());
        assert!(sanitized.contains("keep"));
        assert!(!sanitized.contains("evil"));
    }

    #[test]
    fn only_main_content_extracts_main_tag() {
        let parsed = Html::parse_document(
            "<html><body><nav>nav</nav><main><p>article body</p></main></body></html>",
        );
        let mut options = ScrapeOptions::default();
        options.only_main_content = true;
        let sanitized = sanitize(&parsed, &options);
        assert!(sanitized.contains("article body"));
        assert!(!sanitized.contains("nav"));
    }

    #[test]
    fn exclude_tags_removes_named_elements() {
        let parsed = Html::parse_document(
            "<html><body><header>top</header><p>keep</p></body></html>",
        );
        let mut options = ScrapeOptions::default();
        options.exclude_tags = vec!["header".to_string()];
        let sanitized = sanitize(&parsed, &options);
        assert!(!sanitized.contains("top"));
        assert!(sanitized.contains("keep"));
    }

    #[test]
    fn exclude_tags_matches_wildcard_pattern_against_class() {
        let parsed = Html::parse_document(
            "<html><body><div class=\"banner-ad\">buy now</div><p>keep</p></body></html>",
        );
        let mut options = ScrapeOptions::default();
        options.exclude_tags = vec!["*ad*".to_string()];
        let sanitized = sanitize(&parsed, &options);
        assert!(!sanitized.contains("buy now"));
        assert!(sanitized.contains("keep"));
    }

    #[test]
    fn include_tags_survives_only_main_content_denylist() {
        // `nav` is in MAIN_CONTENT_DENYLIST; includeTags asking for it must
        // still get it back rather than having onlyMainContent strip it
        // first.
        let parsed = Html::parse_document(
            "<html><body><nav id=\"crumbs\">a &gt; b</nav><main><p>article</p></main></body></html>",
        );
        let mut options = ScrapeOptions::default();
        options.only_main_content = true;
        options.include_tags = vec!["#crumbs".to_string()];
        let sanitized = sanitize(&parsed, &options);
        assert!(sanitized.contains("a &gt; b") || sanitized.contains("a > b"));
    }
}
