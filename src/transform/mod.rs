//! Transformer Pipeline (§4.F): a fixed, sequential set of stages run over
//! one freshly fetched page. Each stage takes an immutable [`Document`] and
//! returns a new one — nothing here mutates in place, so each stage is
//! testable against a scaffold `Document` in isolation.
//!
//! Fixed order (§4.F): sanitize → markdown → links → metadata →
//! screenshot-upload → json-extract → removeBase64Images → coerce-to-formats.

pub mod coerce;
pub mod json_extract;
pub mod links;
pub mod markdown;
pub mod metadata;
pub mod sanitize;
pub mod screenshot;

use scraper::Html;

use crate::blob::BlobStore;
use crate::completion::CompletionProvider;
use crate::error::TransformError;
use crate::model::{CostTracking, Document, ScrapeOptions};

/// Runs the full pipeline over a freshly scaffolded `Document` and the raw
/// HTML an engine returned. `screenshot_upload`/`completion` are optional
/// collaborators (§1 external dependencies) — when absent, those stages are
/// no-ops rather than errors, since not every deployment wires a blob store
/// or an LLM completion provider.
pub async fn run_pipeline(
    doc: Document,
    raw_html: &str,
    options: &ScrapeOptions,
) -> Result<Document, TransformError> {
    let mut cost_tracking = CostTracking::default();
    run_pipeline_with(doc, raw_html, options, None, None, &mut cost_tracking).await
}

/// Full-control entry point used by the orchestrator when a blob store or
/// completion provider is configured (see `src/lib.rs` wiring).
pub async fn run_pipeline_with(
    mut doc: Document,
    raw_html: &str,
    options: &ScrapeOptions,
    blob_store: Option<&dyn BlobStore>,
    completion: Option<&dyn CompletionProvider>,
    cost_tracking: &mut CostTracking,
) -> Result<Document, TransformError> {
    use crate::model::Format;

    let parsed = Html::parse_document(raw_html);

    let sanitized_html = sanitize::sanitize(&parsed, options);
    doc.html = Some(sanitized_html.clone());
    if options.formats.contains(&Format::RawHtml) {
        doc.raw_html = Some(raw_html.to_string());
    }

    if options.formats.contains(&Format::Markdown) {
        doc.markdown = Some(markdown::to_markdown(&sanitized_html));
    }

    if options.formats.contains(&Format::Links) {
        let document_url = doc.metadata.url.as_deref().unwrap_or(&doc.metadata.source_url);
        doc.links = Some(links::extract_links(&parsed, document_url));
    }

    metadata::populate(&mut doc.metadata, &parsed);

    if let Some(store) = blob_store {
        screenshot::upload_if_present(&mut doc, store).await?;
    }

    if let Some(extract_opts) = &options.json_extract {
        if let Some(provider) = completion {
            let (value, warning) =
                json_extract::extract(&sanitized_html, extract_opts, provider, cost_tracking).await?;
            doc.json = Some(value);
            if let Some(warning) = warning {
                doc.add_warning(warning);
            }
        }
    }

    if options.remove_base64_images {
        coerce::remove_base64_images(&mut doc);
    }

    coerce::retain_requested_formats(&mut doc, &options.formats);

    Ok(doc)
}
