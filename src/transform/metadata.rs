//! Metadata Extractor (§4.G): populates the OG/Dublin-Core/article field set
//! on a [`DocumentMetadata`] already carrying `source_url`/`status_code`.

use std::collections::BTreeSet;

use scraper::{Html, Selector};

use crate::model::document::MetaValue;
use crate::model::DocumentMetadata;

/// Standard keys already surfaced on dedicated `DocumentMetadata` fields —
/// anything else observed on a `<meta name|property>` tag falls through to
/// `additional` (§4.G).
const KNOWN_NAME_KEYS: &[&str] = &["description", "keywords", "robots"];
const KNOWN_PROPERTY_KEYS: &[&str] = &[
    "og:title",
    "og:description",
    "og:url",
    "og:image",
    "og:site_name",
    "og:locale",
    "og:locale:alternate",
    "article:author",
    "article:published_time",
    "article:modified_time",
    "article:section",
    "article:tag",
];

pub fn populate(metadata: &mut DocumentMetadata, parsed: &Html) {
    metadata.title = select_text(parsed, "title");
    // `description` is always concatenated across repeats into a single
    // comma-joined string (§4.F.4 back-compat rule), unlike every other
    // repeated meta tag which promotes to an array.
    let descriptions = meta_name_all(parsed, "description");
    metadata.description = if descriptions.is_empty() {
        None
    } else {
        Some(descriptions.join(", "))
    };
    metadata.keywords = meta_name_all(parsed, "keywords");
    metadata.robots = meta_content(parsed, "robots");
    metadata.language = html_lang(parsed);
    metadata.favicon = favicon(parsed);

    metadata.og_title = meta_property(parsed, "og:title");
    metadata.og_description = meta_property(parsed, "og:description");
    metadata.og_url = meta_property(parsed, "og:url");
    metadata.og_image = meta_property(parsed, "og:image");
    metadata.og_site_name = meta_property(parsed, "og:site_name");
    metadata.og_locale = meta_property(parsed, "og:locale");
    metadata.og_locale_alternate = meta_property_all(parsed, "og:locale:alternate");

    metadata.dc_title = meta_name(parsed, "dc.title").or_else(|| meta_name(parsed, "dcterms.title"));
    metadata.dc_description =
        meta_name(parsed, "dc.description").or_else(|| meta_name(parsed, "dcterms.description"));
    metadata.dc_subject = meta_name(parsed, "dc.subject");

    metadata.article_author = meta_property(parsed, "article:author");
    metadata.article_published_time = meta_property(parsed, "article:published_time");
    metadata.article_modified_time = meta_property(parsed, "article:modified_time");
    metadata.article_section = meta_property(parsed, "article:section");
    metadata.article_tag = meta_property_all(parsed, "article:tag");

    populate_additional(metadata, parsed);
}

/// Every `<meta name>`/`<meta property>` not already covered by a dedicated
/// field (§4.G "any unknown meta -> string for first, array on repeat").
fn populate_additional(metadata: &mut DocumentMetadata, parsed: &Html) {
    let Ok(selector) = Selector::parse("meta[name], meta[property]") else {
        return;
    };

    for el in parsed.select(&selector) {
        let Some(content) = el.value().attr("content") else { continue };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let (key, is_standard) = if let Some(name) = el.value().attr("name") {
            (name.to_ascii_lowercase(), KNOWN_NAME_KEYS.contains(&name.to_ascii_lowercase().as_str()))
        } else if let Some(property) = el.value().attr("property") {
            (property.to_string(), KNOWN_PROPERTY_KEYS.contains(&property))
        } else {
            continue;
        };

        if is_standard {
            continue;
        }

        let existing = metadata.additional.remove(&key);
        metadata.additional.insert(key, MetaValue::push(existing, content.to_string()));
    }
}

fn meta_name_all(parsed: &Html, name: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(&format!(r#"meta[name="{name}" i]"#)) else {
        return Vec::new();
    };
    let mut seen = BTreeSet::new();
    parsed
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

fn select_text(parsed: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    parsed
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_content(parsed: &Html, name: &str) -> Option<String> {
    meta_name(parsed, name)
}

fn meta_name(parsed: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{name}" i]"#)).ok()?;
    parsed
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_property(parsed: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
    parsed
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_property_all(parsed: &Html, property: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(&format!(r#"meta[property="{property}"]"#)) else {
        return Vec::new();
    };
    parsed
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn html_lang(parsed: &Html) -> Option<String> {
    let selector = Selector::parse("html").ok()?;
    parsed
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn favicon(parsed: &Html) -> Option<String> {
    for rel in ["icon", "shortcut icon", "apple-touch-icon"] {
        let Ok(selector) = Selector::parse(&format!(r#"link[rel="{rel}" i]"#)) else { continue };
        if let Some(href) = parsed.select(&selector).next().and_then(|el| el.value().attr("href")) {
            return Some(href.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn extracts_title_and_description() {
        let parsed = doc(
            r#"<html><head><title>Hello</title><meta name="description" content="A page"></head></html>"#,
        );
        let mut metadata = DocumentMetadata::new("https://example.com", 200);
        populate(&mut metadata, &parsed);
        assert_eq!(metadata.title.as_deref(), Some("Hello"));
        assert_eq!(metadata.description.as_deref(), Some("A page"));
    }

    #[test]
    fn extracts_open_graph_fields() {
        let parsed = doc(
            r#"<html><head>
                <meta property="og:title" content="OG Title">
                <meta property="og:locale:alternate" content="fr_FR">
                <meta property="og:locale:alternate" content="de_DE">
            </head></html>"#,
        );
        let mut metadata = DocumentMetadata::new("https://example.com", 200);
        populate(&mut metadata, &parsed);
        assert_eq!(metadata.og_title.as_deref(), Some("OG Title"));
        assert_eq!(metadata.og_locale_alternate, vec!["fr_FR".to_string(), "de_DE".to_string()]);
    }

    #[test]
    fn missing_tags_leave_fields_none() {
        let parsed = doc("<html><head></head></html>");
        let mut metadata = DocumentMetadata::new("https://example.com", 200);
        populate(&mut metadata, &parsed);
        assert!(metadata.title.is_none());
        assert!(metadata.og_title.is_none());
    }

    #[test]
    fn repeated_description_tags_concatenate() {
        let parsed = doc(
            r#"<html><head><meta name="description" content="first"><meta name="description" content="second"></head></html>"#,
        );
        let mut metadata = DocumentMetadata::new("https://example.com", 200);
        populate(&mut metadata, &parsed);
        assert_eq!(metadata.description.as_deref(), Some("first, second"));
    }

    #[test]
    fn unknown_meta_tag_is_a_string_once_and_an_array_on_repeat() {
        let parsed = doc(
            r#"<html><head>
                <meta name="twitter:card" content="summary">
                <meta property="custom:repeat" content="a">
                <meta property="custom:repeat" content="b">
            </head></html>"#,
        );
        let mut metadata = DocumentMetadata::new("https://example.com", 200);
        populate(&mut metadata, &parsed);
        assert!(matches!(
            metadata.additional.get("twitter:card"),
            Some(MetaValue::Single(s)) if s == "summary"
        ));
        assert!(matches!(
            metadata.additional.get("custom:repeat"),
            Some(MetaValue::Multiple(v)) if v == &vec!["a".to_string(), "b".to_string()]
        ));
    }
}
