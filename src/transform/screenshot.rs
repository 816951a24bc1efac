//! Screenshot-upload stage (§4.F): when a blob store is configured, moves
//! the inline base64 PNG produced by a browser engine into the store and
//! replaces `Document::screenshot` with the resulting URL. Runs before
//! `removeBase64Images` so a caller who only wants `screenshot` as a URL
//! never sees the inline blob even transiently in the response.

use base64::Engine as _;

use crate::blob::BlobStore;
use crate::error::TransformError;
use crate::model::Document;

pub async fn upload_if_present(doc: &mut Document, store: &dyn BlobStore) -> Result<(), TransformError> {
    let Some(inline) = doc.screenshot.take() else {
        return Ok(());
    };

    // Already a URL (e.g. re-running the pipeline on an already-uploaded
    // document) — leave it as-is rather than trying to re-decode it.
    if inline.starts_with("http://") || inline.starts_with("https://") || inline.contains("://") {
        doc.screenshot = Some(inline);
        return Ok(());
    }

    let payload = inline
        .split_once(";base64,")
        .map(|(_, data)| data)
        .unwrap_or(&inline);

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| TransformError::BlobUpload(e.to_string()))?;

    let url = store
        .put("image/png", bytes)
        .await
        .map_err(TransformError::BlobUpload)?;

    doc.screenshot = Some(url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::InMemoryBlobStore;

    #[tokio::test]
    async fn uploads_inline_base64_and_replaces_with_url() {
        let store = InMemoryBlobStore::new();
        let mut doc = Document::scaffold("https://example.com", 200);
        doc.screenshot = Some(base64::engine::general_purpose::STANDARD.encode(b"fake-png"));

        upload_if_present(&mut doc, &store).await.unwrap();

        let url = doc.screenshot.unwrap();
        assert!(url.starts_with("mem://"));
        assert_eq!(store.get(&url).unwrap().1, b"fake-png");
    }

    #[tokio::test]
    async fn uploads_data_uri_screenshot_and_replaces_with_url() {
        let store = InMemoryBlobStore::new();
        let mut doc = Document::scaffold("https://example.com", 200);
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fake-png");
        doc.screenshot = Some(format!("data:image/png;base64,{encoded}"));

        upload_if_present(&mut doc, &store).await.unwrap();

        let url = doc.screenshot.unwrap();
        assert!(url.starts_with("mem://"));
        assert_eq!(store.get(&url).unwrap().1, b"fake-png");
    }

    #[tokio::test]
    async fn leaves_existing_url_untouched() {
        let store = InMemoryBlobStore::new();
        let mut doc = Document::scaffold("https://example.com", 200);
        doc.screenshot = Some("https://cdn.example.com/shot.png".to_string());

        upload_if_present(&mut doc, &store).await.unwrap();

        assert_eq!(doc.screenshot.as_deref(), Some("https://cdn.example.com/shot.png"));
    }

    #[tokio::test]
    async fn no_op_when_no_screenshot_present() {
        let store = InMemoryBlobStore::new();
        let mut doc = Document::scaffold("https://example.com", 200);
        upload_if_present(&mut doc, &store).await.unwrap();
        assert!(doc.screenshot.is_none());
    }
}
