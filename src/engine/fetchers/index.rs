//! Cached-index fetcher (§4.C `index`): a near-zero-cost lookup against a
//! previously indexed copy of the page. Always an `IndexMiss` unless the
//! deployment-supplied [`IndexSource`] has a hit, letting the waterfall
//! treat "no index configured" and "not indexed yet" identically.

use async_trait::async_trait;

use crate::engine::abort::AbortInstance;
use crate::engine::registry::Engine;
use crate::engine::{FetchOutcome, Fetcher};
use crate::error::EngineError;
use crate::model::{ProxyTier, ScrapeOptions, ScrapeUrl};

/// Pluggable lookup backing the index engine. The default (`NoIndex`) always
/// misses; a deployment wanting a real index implements this against
/// whatever cache/store it has.
#[async_trait]
pub trait IndexSource: Send + Sync {
    async fn lookup(&self, url: &ScrapeUrl) -> Option<FetchOutcome>;
}

pub struct NoIndex;

#[async_trait]
impl IndexSource for NoIndex {
    async fn lookup(&self, _url: &ScrapeUrl) -> Option<FetchOutcome> {
        None
    }
}

pub struct IndexFetcher {
    source: Box<dyn IndexSource>,
}

impl IndexFetcher {
    pub fn new(source: Box<dyn IndexSource>) -> Self {
        IndexFetcher { source }
    }

    pub fn disabled() -> Self {
        IndexFetcher { source: Box::new(NoIndex) }
    }
}

#[async_trait]
impl Fetcher for IndexFetcher {
    fn engine(&self) -> Engine {
        Engine::Index
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

        self.source.lookup(url).await.ok_or(EngineError::IndexMiss)
    }
}
