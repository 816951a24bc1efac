//! Shared data model (§3): URLs, scrape options, documents, crawl jobs.

pub mod crawl;
pub mod document;
pub mod options;
pub mod url;

pub use crawl::{CrawlErrorEntry, CrawlErrorsResponse, CrawlJob, CrawlStatus, CrawlerOptions, FrontierEntry};
pub use document::{ActionsResult, Document, DocumentMetadata, MetaValue};
pub use options::{
    Action, CostTracking, Format, FeatureFlag, JsonExtractOptions, Location, ProxyTier, ScrapeOptions,
};
pub use url::{is_same_registrable_domain, remove_duplicate_urls, ScrapeUrl};
