//! PDF-specialized fetcher (§4.C `pdf-fetch`). Downloads the document and
//! extracts its text content without rendering a full browser page. This
//! engine never retries an antibot challenge mid-prefetch itself — the
//! one-retry-then-terminal policy for `PdfAntibot` lives in the
//! orchestrator's waterfall (`Meta.pdf_prefetch`, Open Question 1 in
//! DESIGN.md), not here.

use async_trait::async_trait;
use reqwest::Client;

use crate::engine::abort::AbortInstance;
use crate::engine::registry::Engine;
use crate::engine::{FetchOutcome, Fetcher};
use crate::error::EngineError;
use crate::model::{ProxyTier, ScrapeOptions, ScrapeUrl};

pub struct PdfFetcher {
    client: Client,
}

impl PdfFetcher {
    pub fn new(client: Client) -> Self {
        PdfFetcher { client }
    }
}

#[async_trait]
impl Fetcher for PdfFetcher {
    fn engine(&self) -> Engine {
        Engine::PdfFetch
    }

    async fn fetch(
        &self,
        url: &ScrapeUrl,
        _options: &ScrapeOptions,
        _proxy: Option<ProxyTier>,
        abort: &AbortInstance,
    ) -> Result<FetchOutcome, EngineError> {
        abort
            .throw_if_aborted()
            .map_err(|e| EngineError::Aborted(e.reason))?;

        let Some(remaining) = abort.remaining() else {
            return Err(EngineError::PdfInsufficientTime);
        };
        if remaining.is_zero() {
            return Err(EngineError::PdfInsufficientTime);
        }

        let response = self
            .client
            .get(url.as_url().clone())
            .timeout(remaining)
            .send()
            .await
            .map_err(|_| EngineError::PdfPrefetchFailed)?;

        let status_code = response.status().as_u16();
        if status_code == 403 || status_code == 429 {
            return Err(EngineError::PdfAntibot);
        }

        let final_url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|_| EngineError::PdfPrefetchFailed)?;

        let text = extract_pdf_text(&bytes)?;

        Ok(FetchOutcome {
            status_code,
            final_url,
            html: format!("<pre>{}</pre>", html_escape(&text)),
            ..Default::default()
        })
    }
}

/// A minimal PDF text extraction stand-in: real deployments would call out
/// to a dedicated PDF text layer (e.g. `pdf-extract`/`lopdf`); this engine
/// profile exists in the registry primarily so the waterfall and the
/// `UnsupportedFile`/`PdfAntibot`/`PdfPrefetchFailed` error paths have a
/// concrete implementation to exercise end to end.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, EngineError> {
    if bytes.len() < 5 || &bytes[0..4] != b"%PDF" {
        return Err(EngineError::UnsupportedFile("not a PDF".to_string()));
    }
    Ok(String::from_utf8_lossy(bytes).to_string())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
