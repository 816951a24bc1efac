//! Crawl job data model (§3 `CrawlJob`, `CrawlerOptions`, §4.K frontier entry).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::options::ScrapeOptions;

/// Caller-facing crawl configuration (§3 `CrawlerOptions`, §4.K scope
/// predicate). Field names and defaults mirror the spec's wire shape
/// directly rather than collapsing them into a derived policy enum, since
/// the scope predicate in `src/crawl/scope.rs` checks each of these
/// independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerOptions {
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub max_discovery_depth: Option<u32>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Treat `includePaths`/`excludePaths` as matching against the full URL
    /// rather than just the path component.
    #[serde(default)]
    pub regex_on_full_url: bool,
    /// Allow following links to parent paths of the seed (e.g. seed is
    /// `/blog/post`, link is `/blog`). Aliased by `crawl_entire_domain`
    /// (§4.K "not backward link unless crawlEntireDomain||allowBackwardLinks").
    #[serde(default)]
    pub allow_backward_links: bool,
    #[serde(default)]
    pub crawl_entire_domain: bool,
    /// Follow links that leave the seed's registrable domain entirely.
    #[serde(default)]
    pub allow_external_links: bool,
    /// Follow links to subdomains of the seed's registrable domain.
    #[serde(default)]
    pub allow_subdomains: bool,
    #[serde(default)]
    pub ignore_robots_txt: bool,
    #[serde(default)]
    pub ignore_sitemap: bool,
    #[serde(default = "default_true")]
    pub deduplicate_similar_urls: bool,
    #[serde(default)]
    pub ignore_query_parameters: bool,
    /// Minimum delay, in seconds, enforced between scrapes of the same host.
    #[serde(default)]
    pub delay_secs: Option<f64>,
    #[serde(default)]
    pub scrape_options: ScrapeOptions,
    #[serde(default)]
    pub webhook: Option<String>,
}

fn default_max_depth() -> u32 {
    10
}

fn default_limit() -> u32 {
    10_000
}

fn default_true() -> bool {
    true
}

impl CrawlerOptions {
    /// Whether `allowBackwardLinks` is in effect under either of its two
    /// spelling (§4.K rule 4).
    pub fn backward_links_allowed(&self) -> bool {
        self.allow_backward_links || self.crawl_entire_domain
    }
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        CrawlerOptions {
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            max_depth: default_max_depth(),
            max_discovery_depth: None,
            limit: default_limit(),
            regex_on_full_url: false,
            allow_backward_links: false,
            crawl_entire_domain: false,
            allow_external_links: false,
            allow_subdomains: false,
            ignore_robots_txt: false,
            ignore_sitemap: false,
            deduplicate_similar_urls: true,
            ignore_query_parameters: false,
            delay_secs: None,
            scrape_options: ScrapeOptions::default(),
            webhook: None,
        }
    }
}

/// Crawl lifecycle states (§4.K, §9 Open Question 2: a crawl that exhausts
/// its frontier with zero documents is `Completed`, not `Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrawlStatus {
    Scraping,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub id: Uuid,
    pub seeds: Vec<String>,
    pub options: CrawlerOptions,
    pub status: CrawlStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Best-estimate total: every URL enqueued so far, including ones not
    /// yet scraped (§4.K "total (best-estimate = enqueued)").
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    /// Count of distinct URLs the frontier has ever seen, scraped or not
    /// (§3 `CrawlJob.discovered`).
    #[serde(default)]
    pub discovered: u32,
    #[serde(default)]
    pub robots_blocked: Vec<String>,
}

impl CrawlJob {
    pub fn new(seeds: Vec<String>, options: CrawlerOptions) -> Self {
        CrawlJob {
            id: Uuid::new_v4(),
            seeds,
            options,
            status: CrawlStatus::Scraping,
            created_at: Utc::now(),
            completed_at: None,
            total: 0,
            completed: 0,
            discovered: 0,
            robots_blocked: Vec::new(),
        }
    }

    /// `completed <= total <= limit` (§3 invariant). Checked at the call
    /// sites that mutate `total`/`completed`, not enforced structurally,
    /// since a `CrawlJob` is a plain data record the coordinator mutates
    /// through a [`crate::store::JobStore`].
    pub fn invariant_holds(&self) -> bool {
        self.completed <= self.total && self.total <= self.options.limit
    }
}

/// A single URL's position in the crawl frontier (§4.K). `depth` counts
/// link-following hops from a seed; `discovery_depth` counts hops through
/// non-scraped (sitemap/discovery-only) pages, tracked separately because
/// `max_discovery_depth` may be tighter than `max_depth`. `sequence` is the
/// FIFO tiebreaker within a depth level (§5 "breadth-first with FIFO
/// tie-break").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
    pub discovery_depth: u32,
    pub sequence: u64,
}

/// Per-URL crawl outcome recorded for the `/v1/crawl/{id}/errors` endpoint
/// (§6), mirroring the `CrawlErrorsResponse { errors, robots_blocked }`
/// shape confirmed in the Firecrawl Rust SDK types file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlErrorEntry {
    pub id: String,
    pub url: String,
    pub error: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlErrorsResponse {
    pub errors: Vec<CrawlErrorEntry>,
    pub robots_blocked: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_crawl_job_starts_scraping_with_no_progress() {
        let job = CrawlJob::new(vec!["https://example.com".to_string()], CrawlerOptions::default());
        assert_eq!(job.status, CrawlStatus::Scraping);
        assert_eq!(job.completed, 0);
        assert!(job.invariant_holds());
    }

    #[test]
    fn backward_links_allowed_checks_either_spelling() {
        let mut opts = CrawlerOptions::default();
        assert!(!opts.backward_links_allowed());
        opts.crawl_entire_domain = true;
        assert!(opts.backward_links_allowed());
    }
}
