//! Plain-HTTP and proxied-HTTP fetchers (§4.C `fetch-http`/`fetch-proxy`).
//!
//! Both engines share this implementation; the only difference is whether a
//! proxy is threaded through to the underlying `reqwest::Client`, matching
//! how the teacher's `tools/scrape.rs` reuses one HTTP path for its
//! proxy-retried fetch stage rather than forking the request logic.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::engine::abort::AbortInstance;
use crate::engine::registry::Engine;
use crate::engine::{FetchOutcome, Fetcher};
use crate::error::{EngineError, FeatureSignal};
use crate::model::{FeatureFlag, ProxyTier, ScrapeOptions, ScrapeUrl};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; FirecrawlCoreBot/1.0)";

pub struct HttpFetcher {
    engine: Engine,
    client: Client,
    proxy_client: Option<Client>,
    stealth_client: Option<Client>,
}

impl HttpFetcher {
    pub fn plain(client: Client) -> Self {
        HttpFetcher { engine: Engine::FetchHttp, client, proxy_client: None, stealth_client: None }
    }

    pub fn proxied(client: Client, proxy_client: Client, stealth_client: Client) -> Self {
        HttpFetcher {
            engine: Engine::FetchProxy,
            client,
            proxy_client: Some(proxy_client),
            stealth_client: Some(stealth_client),
        }
    }

    fn client_for(&self, proxy: Option<ProxyTier>) -> &Client {
        match proxy {
            Some(ProxyTier::Stealth) => self.stealth_client.as_ref().unwrap_or(&self.client),
            Some(ProxyTier::Basic) => self.proxy_client.as_ref().unwrap_or(&self.client),
            Some(ProxyTier::Auto) | None => &self.client,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn fetch(
        &self,
        url: &ScrapeUrl,
        options: &ScrapeOptions,
        proxy: Option<ProxyTier>,
        abort: &AbortInstance,
    ) -> Result<FetchOutcome, EngineError> {
        abort
            .throw_if_aborted()
            .map_err(|e| EngineError::Aborted(e.reason))?;

        let client = self.client_for(proxy);
        let mut request = client.get(url.as_url().clone()).header("User-Agent", USER_AGENT);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(remaining) = abort.remaining() {
            request = request.timeout(remaining);
        }

        let response = tokio::select! {
            res = request.send() => res.map_err(classify_reqwest_error)?,
            _ = abort.cancelled() => return Err(EngineError::Aborted("engine timeout".to_string())),
        };

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type.contains("application/pdf") {
            if !options.parse_pdf {
                return Err(EngineError::UnsupportedFile("application/pdf".to_string()));
            }
            // Widen into the PDF engine rather than failing outright: the
            // orchestrator renegotiates and retries with `PdfFetch` in the
            // fallback list (§4.E feature renegotiation).
            return Err(EngineError::Feature(FeatureSignal::AddFeature(
                vec![FeatureFlag::PDF.to_string()],
                Some(true),
            )));
        }

        let html = response.text().await.map_err(classify_reqwest_error)?;

        debug!(url = %url, status_code, engine = ?self.engine, "fetch completed");

        if html.trim().len() < 32 && (200..300).contains(&status_code) {
            return Err(EngineError::EngineUnsuccessful);
        }

        Ok(FetchOutcome {
            status_code,
            final_url,
            html,
            response_headers: headers,
            ..Default::default()
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Aborted("request timed out".to_string())
    } else if err.is_connect() {
        EngineError::DnsResolution(err.to_string())
    } else if err.to_string().to_ascii_lowercase().contains("certificate") {
        EngineError::Ssl(err.to_string())
    } else {
        EngineError::Internal(err.to_string())
    }
}
