//! Engine waterfall (§4.C/§4.D/§4.E): the static registry, the abort
//! hierarchy, the per-engine fetchers, and the orchestrator that races them.

pub mod abort;
pub mod fetchers;
pub mod orchestrator;
pub mod registry;

pub use abort::{AbortInstance, AbortedError};
pub use orchestrator::{Meta, ScrapeOrchestrator};
pub use registry::{Engine, EngineProfile, EngineRegistry, FallbackCandidate};

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::EngineError;
use crate::model::{ActionsResult, FeatureFlag, ProxyTier, ScrapeOptions};

/// Raw output a fetcher hands back to the orchestrator before any
/// transformer stage runs (§4.E). `html`/`raw_html` is the only field every
/// non-PDF engine populates; `screenshot` is only set when the request asked
/// for it and the engine supports it.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub status_code: u16,
    pub final_url: String,
    pub html: String,
    pub screenshot: Option<String>,
    pub response_headers: Vec<(String, String)>,
    /// Screenshots/scrapes captured by `actions` steps, if the request ran
    /// any (§3 `Document.actions`).
    pub actions: Option<ActionsResult>,
    /// Features the winning engine advertised as unsupported, set by the
    /// waterfall from the registry's candidate list rather than by the
    /// fetcher itself (§4.C/§4.E).
    pub unsupported_features: BTreeSet<FeatureFlag>,
}

/// One engine's fetch behavior (§4.C/§4.E). Implemented once per
/// [`Engine`] variant in `fetchers/`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn engine(&self) -> Engine;

    async fn fetch(
        &self,
        url: &crate::model::ScrapeUrl,
        options: &ScrapeOptions,
        proxy: Option<ProxyTier>,
        abort: &AbortInstance,
    ) -> Result<FetchOutcome, EngineError>;
}
