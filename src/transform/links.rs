//! Link Extractor (§4.I): collects every `<a href>` on the page, resolved to
//! absolute URLs against `<base href>` if present (itself resolved against
//! the document URL), else against the document URL directly. Robots/scope
//! filtering is applied by the crawl coordinator (§4.K), not here — a plain
//! scrape's `formats: ["links"]` output is unfiltered.

use scraper::{Html, Selector};
use url::Url;

/// Resolves `<base href>` against `document_url` if present; falls back to
/// `document_url` itself (§4.I / §8 "base href resolved against document
/// URL if itself relative").
fn effective_base(parsed: &Html, document_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return document_url.clone();
    };
    let Some(href) = parsed.select(&selector).next().and_then(|el| el.value().attr("href")) else {
        return document_url.clone();
    };
    document_url.join(href).unwrap_or_else(|_| document_url.clone())
}

pub fn extract_links(parsed: &Html, source_url: &str) -> Vec<String> {
    let Ok(document_url) = Url::parse(source_url) else {
        return Vec::new();
    };
    let base = effective_base(parsed, &document_url);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = std::collections::BTreeSet::new();
    let mut links = Vec::new();

    for el in parsed.select(&selector) {
        let Some(href) = el.value().attr("href") else { continue };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        if let Some(rest) = href.strip_prefix("mailto:") {
            let mailto = format!("mailto:{rest}");
            if seen.insert(mailto.clone()) {
                links.push(mailto);
            }
            continue;
        }
        let Ok(resolved) = base.join(href) else { continue };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        let absolute = resolved.to_string();
        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_links_against_source_url() {
        let html = Html::parse_document(r#"<a href="/about">About</a>"#);
        let links = extract_links(&html, "https://example.com/blog/post");
        assert_eq!(links, vec!["https://example.com/about".to_string()]);
    }

    #[test]
    fn skips_fragment_and_javascript_links() {
        let html = Html::parse_document(
            r#"<a href="#top">Top</a><a href="javascript:void(0)">Click</a><a href="/page">Page</a>"#,
        );
        let links = extract_links(&html, "https://example.com/");
        assert_eq!(links, vec!["https://example.com/page".to_string()]);
    }

    #[test]
    fn deduplicates_repeated_links() {
        let html = Html::parse_document(
            r#"<a href="/page">One</a><a href="/page">Two</a>"#,
        );
        let links = extract_links(&html, "https://example.com/");
        assert_eq!(links.len(), 1);
    }
}
