//! Final pipeline stage (§4.F.7-8): strip inline base64 images when asked,
//! then drop every `Document` field not in the requested format set,
//! warning if a requested format never got populated.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Document, Format};

fn base64_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[([^\]]*)\]\(data:image/[^)]*\)").unwrap())
}

/// `removeBase64Images` (§4.F.7): replaces inline base64 image data URIs in
/// markdown with a placeholder, keeping the alt text.
pub fn remove_base64_images(doc: &mut Document) {
    if let Some(markdown) = &doc.markdown {
        let replaced = base64_image_regex()
            .replace_all(markdown, "![$1](<Base64-Image-Removed>)")
            .into_owned();
        doc.markdown = Some(replaced);
    }
}

/// `coerceFieldsToFormats` (§4.F.8): the pipeline populates every requested
/// field unconditionally as it runs, so this stage is the single place that
/// enforces the §8 invariant "every field key is in the requested formats
/// set" — clearing anything the caller didn't ask for and warning about
/// anything requested that still came back empty.
pub fn retain_requested_formats(doc: &mut Document, formats: &BTreeSet<Format>) {
    if !formats.contains(&Format::Markdown) {
        doc.markdown = None;
    } else if doc.markdown.is_none() {
        doc.add_warning("requested format 'markdown' produced no content");
    }

    if !formats.contains(&Format::Html) {
        doc.html = None;
    }

    if !formats.contains(&Format::RawHtml) {
        doc.raw_html = None;
    }

    if !formats.contains(&Format::Links) {
        doc.links = None;
    } else if doc.links.is_none() {
        doc.add_warning("requested format 'links' produced no content");
    }

    let wants_screenshot = formats.contains(&Format::Screenshot) || formats.contains(&Format::ScreenshotFullPage);
    if !wants_screenshot {
        doc.screenshot = None;
    } else if doc.screenshot.is_none() {
        doc.add_warning("requested format 'screenshot' produced no content");
    }

    if !formats.contains(&Format::Json) {
        doc.json = None;
    } else if doc.json.is_none() {
        doc.add_warning("requested format 'json' (extract) produced no content");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_inline_base64_image_keeping_alt_text() {
        let mut doc = Document::scaffold("https://example.com", 200);
        doc.markdown = Some("![a photo](data:image/png;base64,AAAA) text".to_string());
        remove_base64_images(&mut doc);
        assert_eq!(doc.markdown.as_deref(), Some("![a photo](<Base64-Image-Removed>) text"));
    }

    #[test]
    fn retain_clears_fields_outside_requested_formats() {
        let mut doc = Document::scaffold("https://example.com", 200);
        doc.markdown = Some("hi".to_string());
        doc.html = Some("<p>hi</p>".to_string());
        let formats = BTreeSet::from([Format::Markdown]);
        retain_requested_formats(&mut doc, &formats);
        assert!(doc.markdown.is_some());
        assert!(doc.html.is_none());
    }

    #[test]
    fn retain_warns_when_requested_format_produced_nothing() {
        let mut doc = Document::scaffold("https://example.com", 200);
        let formats = BTreeSet::from([Format::Links]);
        retain_requested_formats(&mut doc, &formats);
        assert!(doc.warning.is_some());
    }
}
