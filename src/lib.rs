//! firecrawl-core: a URL scraping orchestration engine. An engine waterfall
//! (§4.C-E) races several fetch strategies per URL, a transformer pipeline
//! (§4.F-J) turns the winning fetch into a `Document`, and a crawl
//! coordinator (§4.K) walks a site's link graph by repeating the scrape
//! over a breadth-first frontier. All three are exposed over HTTP (§6).

pub mod api;
pub mod blob;
pub mod completion;
pub mod config;
pub mod crawl;
pub mod engine;
pub mod error;
pub mod job;
pub mod map;
pub mod model;
pub mod robots;
pub mod store;
pub mod transform;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::Client;

use crate::config::Config;
use crate::crawl::Coordinator;
use crate::engine::ScrapeOrchestrator;
use crate::job::JobAdapter;
use crate::robots::RobotsPolicy;
use crate::store::JobStore;

/// The composition root wired together in `main()` and threaded through
/// every HTTP handler via axum's `State` extractor (mirrors the teacher's
/// `AppState` in `core/app_state.rs`).
pub struct AppState {
    pub http_client: Client,
    pub config: Config,
    pub orchestrator: Arc<ScrapeOrchestrator>,
    pub coordinator: Coordinator,
    pub store: Arc<dyn JobStore>,
    /// Count of scrapes currently in flight, surfaced by
    /// `GET /v1/concurrency-check` (§6).
    active_scrapes: AtomicUsize,
}

impl AppState {
    pub fn new(
        http_client: Client,
        config: Config,
        orchestrator: Arc<ScrapeOrchestrator>,
        robots: RobotsPolicy,
        store: Arc<dyn JobStore>,
        jobs: Arc<JobAdapter>,
        webhooks: crate::job::WebhookEmitter,
    ) -> Self {
        let coordinator =
            Coordinator::new(orchestrator.clone(), robots, store.clone(), jobs, webhooks, http_client.clone())
                .with_concurrency(config.max_concurrency);
        AppState { http_client, config, orchestrator, coordinator, store, active_scrapes: AtomicUsize::new(0) }
    }

    /// Marks one scrape as started; returns a guard that decrements the
    /// counter on drop so a panicking handler can never leak the count.
    pub fn track_scrape(&self) -> ScrapeGuard<'_> {
        self.active_scrapes.fetch_add(1, Ordering::SeqCst);
        ScrapeGuard { state: self }
    }

    pub fn active_scrape_count(&self) -> usize {
        self.active_scrapes.load(Ordering::SeqCst)
    }
}

pub struct ScrapeGuard<'a> {
    state: &'a AppState,
}

impl Drop for ScrapeGuard<'_> {
    fn drop(&mut self) {
        self.state.active_scrapes.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        use std::collections::BTreeMap;

        let client = Client::new();
        let config = Config::from_env();
        let robots = RobotsPolicy::new(client.clone());
        let orchestrator = Arc::new(ScrapeOrchestrator::new(BTreeMap::new(), robots.clone()));
        let store: Arc<dyn JobStore> = Arc::new(crate::store::InMemoryJobStore::new());
        let jobs = Arc::new(JobAdapter::new());
        let webhooks = crate::job::WebhookEmitter::new(client.clone(), None);
        AppState::new(client, config, orchestrator, robots, store, jobs, webhooks)
    }

    #[test]
    fn track_scrape_increments_and_decrements_on_drop() {
        let state = test_state();
        assert_eq!(state.active_scrape_count(), 0);
        {
            let _guard = state.track_scrape();
            assert_eq!(state.active_scrape_count(), 1);
        }
        assert_eq!(state.active_scrape_count(), 0);
    }
}
