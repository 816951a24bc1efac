//! The scrape result shape (§3 `Document`/`DocumentMetadata`).
//!
//! Field names and the "always present" status fields mirror the client-side
//! mirror of this same wire contract in the Firecrawl Rust SDK
//! (`other_examples/54d62ebd_yzkee-firecrawl__apps-rust-sdk-src-v2-types.rs.rs`),
//! since that file documents exactly the shape a producer here must emit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A scrape result. Immutable once constructed — the transformer pipeline
/// (§4.F) produces successive new `Document` values rather than mutating one
/// in place, which is what lets each stage be tested in isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Non-fatal issues accumulated across the pipeline (e.g. "engine X was
    /// missing feature Y", a coerced-format warning) — concatenated into one
    /// string per §7 "warnings attached to document.warning".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<ActionsResult>,
    pub metadata: DocumentMetadata,
}

/// Results of any `actions` the caller asked the engine to perform (§3
/// `Document.actions`): inline screenshots taken mid-sequence and the HTML
/// captured by any `scrape` action steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResult {
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub scrapes: Vec<String>,
}

impl Document {
    /// An empty document scaffold for a given source URL, before any
    /// transformer stage has run. The orchestrator fills in `html`/`raw_html`
    /// from the winning engine's output; every other field is populated by
    /// the pipeline in `src/transform`.
    pub fn scaffold(source_url: impl Into<String>, status_code: u16) -> Self {
        Document {
            markdown: None,
            html: None,
            raw_html: None,
            links: None,
            screenshot: None,
            json: None,
            warning: None,
            actions: None,
            metadata: DocumentMetadata::new(source_url, status_code),
        }
    }

    /// Appends `message` to the accumulated warning, comma-joining with any
    /// warning already present (§4.F "warnings attached to document.warning").
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        match &mut self.warning {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(&message);
            }
            None => self.warning = Some(message),
        }
    }
}

/// Page metadata (§3 `DocumentMetadata`). `source_url` and `status_code` are
/// always present (populated by the orchestrator before the metadata
/// extractor runs); everything else is `None` until the HTML actually
/// contains the corresponding tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub source_url: String,
    /// The URL actually served, after following any redirects (§3
    /// `DocumentMetadata.url`) — distinct from `source_url`, which is always
    /// the caller's original, pre-rewrite input (§8 invariant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Proxy tier the winning engine attempt actually used, if any (§4.E
    /// "construct Document with metadata(... proxyUsed)").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_used: Option<crate::model::options::ProxyTier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// §4.G "repeated standard fields become an array": a page can legally
    /// carry multiple `<meta name="keywords">` tags.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robots: Option<String>,

    // Open Graph
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_locale: Option<String>,
    #[serde(default)]
    pub og_locale_alternate: Vec<String>,

    // Dublin Core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_subject: Option<String>,

    // Article
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_published_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_modified_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_section: Option<String>,
    #[serde(default)]
    pub article_tag: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default)]
    pub num_pages: Option<u32>,

    /// Every other `<meta name|property>` tag not named above (§4.G): first
    /// occurrence stored as a bare string, repeats promoted to an array.
    #[serde(flatten)]
    pub additional: BTreeMap<String, MetaValue>,
}

/// A `DocumentMetadata.additional` entry: a single value for a tag seen once,
/// an array once a second occurrence of the same name/property is seen
/// (§4.G "any unknown meta -> string for first, array on repeat").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Single(String),
    Multiple(Vec<String>),
}

impl MetaValue {
    /// Folds a newly observed value into an existing slot, promoting to
    /// `Multiple` on the second occurrence.
    pub fn push(existing: Option<MetaValue>, value: String) -> MetaValue {
        match existing {
            None => MetaValue::Single(value),
            Some(MetaValue::Single(first)) => MetaValue::Multiple(vec![first, value]),
            Some(MetaValue::Multiple(mut values)) => {
                values.push(value);
                MetaValue::Multiple(values)
            }
        }
    }
}

impl DocumentMetadata {
    pub fn new(source_url: impl Into<String>, status_code: u16) -> Self {
        DocumentMetadata {
            source_url: source_url.into(),
            url: None,
            status_code,
            error: None,
            content_type: None,
            proxy_used: None,
            title: None,
            description: None,
            language: None,
            keywords: Vec::new(),
            robots: None,
            og_title: None,
            og_description: None,
            og_url: None,
            og_image: None,
            og_site_name: None,
            og_locale: None,
            og_locale_alternate: Vec::new(),
            dc_title: None,
            dc_description: None,
            dc_subject: None,
            article_author: None,
            article_published_time: None,
            article_modified_time: None,
            article_section: None,
            article_tag: Vec::new(),
            favicon: None,
            num_pages: None,
            additional: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_always_carries_source_url_and_status() {
        let doc = Document::scaffold("https://example.com/", 200);
        assert_eq!(doc.metadata.source_url, "https://example.com/");
        assert_eq!(doc.metadata.status_code, 200);
        assert!(doc.markdown.is_none());
    }

    #[test]
    fn metadata_round_trips_through_json_omitting_absent_fields() {
        let doc = Document::scaffold("https://example.com/", 200);
        let value = serde_json::to_value(&doc).unwrap();
        let metadata = value.get("metadata").unwrap();
        assert!(metadata.get("title").is_none());
        assert_eq!(metadata.get("statusCode").unwrap(), 200);
    }
}
