//! Crawl Coordinator (§4.K): seeds a [`frontier::Frontier`] from the job's
//! start URL(s), pops entries breadth-first, scrapes each through the
//! [`ScrapeOrchestrator`], scope-filters the links it discovers, and feeds
//! survivors back into the frontier until it drains, the job's limit is
//! reached, or the job is cancelled.
//!
//! Single-writer by construction (§5 "stable against races because
//! scope+dedup happens under a per-job lock or single-writer coordinator"):
//! one [`Coordinator::run`] task owns the frontier and the job's progress
//! counters for the whole lifetime of a crawl; concurrency comes only from
//! the scrape tasks it spawns, which report results back over a channel
//! rather than touching the frontier directly.

pub mod frontier;
pub mod scope;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::engine::abort::AbortInstance;
use crate::engine::ScrapeOrchestrator;
use crate::error::{AbortTier, CrawlJobError, ScrapeError};
use crate::job::{JobAdapter, WebhookEmitter, WebhookEvent};
use crate::map::fetch_sitemap_urls;
use crate::model::{
    remove_duplicate_urls, CrawlErrorEntry, CrawlJob, CrawlStatus, CrawlerOptions, Document, Format,
    FrontierEntry, ScrapeUrl,
};
use crate::robots::RobotsPolicy;
use crate::store::JobStore;

use frontier::Frontier;

const DEFAULT_CONCURRENCY: usize = 8;

struct WorkerResult {
    entry: FrontierEntry,
    result: Result<Document, ScrapeError>,
    links: Vec<String>,
    robots_denied: BTreeMap<String, &'static str>,
}

/// Ties the frontier, scope predicate, robots enforcement, scrape
/// orchestrator, and job bookkeeping together (§4.K).
pub struct Coordinator {
    orchestrator: Arc<ScrapeOrchestrator>,
    robots: RobotsPolicy,
    store: Arc<dyn JobStore>,
    jobs: Arc<JobAdapter>,
    webhooks: WebhookEmitter,
    http_client: Client,
    concurrency: usize,
}

impl Clone for Coordinator {
    fn clone(&self) -> Self {
        Coordinator {
            orchestrator: self.orchestrator.clone(),
            robots: self.robots.clone(),
            store: self.store.clone(),
            jobs: self.jobs.clone(),
            webhooks: self.webhooks.clone(),
            http_client: self.http_client.clone(),
            concurrency: self.concurrency,
        }
    }
}

impl Coordinator {
    pub fn new(
        orchestrator: Arc<ScrapeOrchestrator>,
        robots: RobotsPolicy,
        store: Arc<dyn JobStore>,
        jobs: Arc<JobAdapter>,
        webhooks: WebhookEmitter,
        http_client: Client,
    ) -> Self {
        Coordinator { orchestrator, robots, store, jobs, webhooks, http_client, concurrency: DEFAULT_CONCURRENCY }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// `start` (§4.K): validates the seed(s), checks robots.txt, registers
    /// the job, and spawns the worker loop in the background. Returns
    /// immediately with the new job's id; callers observe progress by
    /// polling the job store (§6 `GET /v1/crawl/{id}`).
    pub async fn start(&self, seeds: Vec<String>, options: CrawlerOptions) -> Result<Uuid, CrawlJobError> {
        if seeds.is_empty() {
            return Err(CrawlJobError::SeedUnreachable("no seed URL supplied".to_string()));
        }
        for seed in &seeds {
            ScrapeUrl::validate(seed)?;
        }

        let seed_url =
            Url::parse(&seeds[0]).map_err(|_| CrawlJobError::SeedUnreachable(seeds[0].clone()))?;
        if !options.ignore_robots_txt && !self.robots.is_allowed(&seed_url).await {
            return Err(CrawlJobError::SeedRobotsBlocked);
        }

        let job = CrawlJob::new(seeds.clone(), options.clone());
        let id = job.id;
        self.store.put(job).await;

        let handle = self.jobs.enqueue(id, AbortTier::External);
        let worker = self.clone();
        tokio::spawn(async move {
            worker.run(id, seeds, options, handle.abort).await;
        });

        Ok(id)
    }

    /// `cancel(jobId)` (§4.K "a DELETE at any time results in terminal
    /// state cancelled", §4.L): aborts the job's [`AbortInstance`]; the
    /// worker loop observes it on its next iteration and finalizes as
    /// [`CrawlStatus::Cancelled`], which wins over a concurrently finishing
    /// `Completed` (§3 invariant).
    pub fn cancel(&self, id: Uuid) -> Result<(), CrawlJobError> {
        self.jobs.cancel(id)
    }

    async fn run(&self, id: Uuid, seeds: Vec<String>, options: CrawlerOptions, abort: AbortInstance) {
        if let Some(webhook) = &options.webhook {
            self.webhooks.emit(webhook, WebhookEvent::Started, id, None).await;
        }

        let seeds = if options.deduplicate_similar_urls { remove_duplicate_urls(&seeds) } else { seeds };

        let Some(seed_url) = seeds.first().and_then(|s| Url::parse(s).ok()) else {
            self.store.update(id, |job| job.status = CrawlStatus::Failed).await;
            self.finalize(id, &options, CrawlStatus::Failed).await;
            return;
        };

        let mut frontier = Frontier::new();
        let mut discovered = 0u32;
        for seed in &seeds {
            if frontier.offer(seed.clone(), 0, 0, options.ignore_query_parameters) {
                discovered += 1;
            }
        }

        if !options.ignore_sitemap {
            let sitemap_urls = fetch_sitemap_urls(&self.http_client, &seed_url).await;
            for link in sitemap_urls {
                let Ok(candidate) = Url::parse(&link) else { continue };
                if scope::allowed(&candidate, &seed_url, 0, 1, &options).is_err() {
                    continue;
                }
                if frontier.offer(link, 0, 1, options.ignore_query_parameters) {
                    discovered += 1;
                }
            }
        }

        self.store.update(id, |job| job.discovered = discovered).await;

        let host_last_visit: Arc<AsyncMutex<HashMap<String, Instant>>> =
            Arc::new(AsyncMutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerResult>();
        let mut active = 0usize;
        let mut total = 0u32;
        let mut status = CrawlStatus::Completed;

        loop {
            if abort.is_aborted() {
                status = CrawlStatus::Cancelled;
                break;
            }

            while active < self.concurrency && !frontier.is_empty() && total < options.limit {
                let Some(entry) = frontier.pop() else { break };
                active += 1;
                total += 1;
                self.store.update(id, |job| job.total = total).await;

                let orchestrator = self.orchestrator.clone();
                let robots = self.robots.clone();
                let mut scrape_options = options.scrape_options.clone();
                scrape_options.formats.insert(Format::Links);
                let engine_abort = abort.child(AbortTier::Scrape, None);
                let host_last_visit = host_last_visit.clone();
                let delay = options.delay_secs;
                let ignore_robots_txt = options.ignore_robots_txt;
                let tx = tx.clone();

                tokio::spawn(async move {
                    if let Some(delay_secs) = delay {
                        wait_for_host_slot(&entry.url, delay_secs, &host_last_visit).await;
                    }

                    let result = orchestrator.scrape(&entry.url, scrape_options, &engine_abort).await;
                    let discovered_links = match &result {
                        Ok(doc) => doc.links.clone().unwrap_or_default(),
                        Err(_) => Vec::new(),
                    };
                    let (links, robots_denied) = if ignore_robots_txt {
                        (discovered_links, BTreeMap::new())
                    } else {
                        robots.filter_links_with_reasons(discovered_links).await
                    };
                    let _ = tx.send(WorkerResult { entry, result, links, robots_denied });
                });
            }

            if active == 0 {
                break;
            }

            let Some(work_result) = rx.recv().await else { break };
            active -= 1;

            for denied_url in work_result.robots_denied.into_keys() {
                self.store.update(id, |job| job.robots_blocked.push(denied_url.clone())).await;
            }

            match work_result.result {
                Ok(mut document) => {
                    document.links = Some(work_result.links.clone());
                    self.store.push_document(id, document).await;
                    self.store.update(id, |job| job.completed += 1).await;
                    if let Some(webhook) = &options.webhook {
                        self.webhooks.emit(webhook, WebhookEvent::Page, id, None).await;
                    }

                    let child_depth = work_result.entry.depth + 1;
                    let child_discovery_depth = work_result.entry.discovery_depth + 1;
                    for link in work_result.links {
                        let Ok(candidate) = Url::parse(&link) else { continue };
                        if scope::allowed(&candidate, &seed_url, child_depth, child_discovery_depth, &options)
                            .is_err()
                        {
                            continue;
                        }
                        if frontier.offer(link, child_depth, child_discovery_depth, options.ignore_query_parameters)
                        {
                            discovered += 1;
                            self.store.update(id, |job| job.discovered = discovered).await;
                        }
                    }
                }
                Err(error) => {
                    warn!(url = %work_result.entry.url, error = %error, "crawl scrape failed");
                    self.store
                        .record_error(
                            id,
                            CrawlErrorEntry {
                                id: Uuid::new_v4().to_string(),
                                url: work_result.entry.url,
                                error: error.to_string(),
                                timestamp: Some(Utc::now()),
                            },
                        )
                        .await;
                }
            }
        }

        self.finalize(id, &options, status).await;
    }

    async fn finalize(&self, id: Uuid, options: &CrawlerOptions, status: CrawlStatus) {
        self.store
            .update(id, move |job| {
                job.status = status;
                job.completed_at = Some(Utc::now());
            })
            .await;
        self.jobs.remove_job(id);

        if let Some(webhook) = &options.webhook {
            // The webhook vocabulary (§4.L) only names started/page/completed/failed;
            // a cancelled crawl is reported as `failed` since it did not reach a
            // natural completion (decided open question, see DESIGN.md).
            let event = match status {
                CrawlStatus::Completed => WebhookEvent::Completed,
                CrawlStatus::Cancelled | CrawlStatus::Failed => WebhookEvent::Failed,
                CrawlStatus::Scraping => return,
            };
            self.webhooks.emit(webhook, event, id, None).await;
        }
    }
}

/// Enforces `delay` between scrapes of the same host (§4.K, §5): blocks
/// until at least `delay_secs` has elapsed since the last scrape of this
/// URL's host, then reserves the new slot before releasing the lock so two
/// concurrently starting tasks for the same host serialize correctly.
async fn wait_for_host_slot(url: &str, delay_secs: f64, host_last_visit: &AsyncMutex<HashMap<String, Instant>>) {
    let Ok(parsed) = Url::parse(url) else { return };
    let Some(host) = parsed.host_str().map(|h| h.to_string()) else { return };

    let wait_until = {
        let mut last_visit = host_last_visit.lock().await;
        let now = Instant::now();
        let next = last_visit
            .get(&host)
            .map(|last| *last + Duration::from_secs_f64(delay_secs))
            .unwrap_or(now);
        let reserved = next.max(now);
        last_visit.insert(host, reserved);
        reserved
    };

    let now = Instant::now();
    if wait_until > now {
        tokio::time::sleep(wait_until - now).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_host_slot_serializes_same_host_requests() {
        let host_last_visit = AsyncMutex::new(HashMap::new());
        let start = Instant::now();
        wait_for_host_slot("https://example.com/a", 0.05, &host_last_visit).await;
        wait_for_host_slot("https://example.com/b", 0.05, &host_last_visit).await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn wait_for_host_slot_does_not_delay_different_hosts() {
        let host_last_visit = AsyncMutex::new(HashMap::new());
        wait_for_host_slot("https://a.example/x", 10.0, &host_last_visit).await;
        let start = Instant::now();
        wait_for_host_slot("https://b.example/x", 10.0, &host_last_visit).await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
