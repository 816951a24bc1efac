//! Map (§6 `POST /v1/map`): discover the URLs a site exposes without
//! scraping each one. Two sources feed the result set — the site's
//! `sitemap.xml`, and (unless `sitemapOnly`) the links on the seed page
//! itself — deduplicated and optionally filtered by a `search` substring
//! and `includeSubdomains`.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::model::{is_same_registrable_domain, remove_duplicate_urls, ScrapeUrl};
use crate::transform::links;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub include_subdomains: bool,
    #[serde(default)]
    pub sitemap_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    5_000
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions { search: None, include_subdomains: false, sitemap_only: false, limit: default_limit() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapResult {
    pub links: Vec<String>,
}

/// A `<loc>` extractor for `sitemap.xml`. The pack carries no XML-parsing
/// crate, and a sitemap's relevant structure is a flat list of `<loc>`
/// elements, so a regex over the raw bytes is the simplest correct tool
/// here rather than reaching for a general XML parser.
static LOC_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<loc>\s*([^<\s]+)\s*</loc>").unwrap());

pub async fn map(client: &Client, raw_url: &str, options: &MapOptions) -> Result<MapResult, ScrapeError> {
    let url = ScrapeUrl::validate_for_map(raw_url)?;
    let seed = url.as_url().clone();

    let mut discovered = fetch_sitemap_urls(client, &seed).await;

    if !options.sitemap_only {
        if let Ok(page_links) = fetch_page_links(client, &seed).await {
            discovered.extend(page_links);
        }
    }

    let mut filtered: Vec<String> = discovered
        .into_iter()
        .filter(|link| {
            let Ok(parsed) = url::Url::parse(link) else { return false };
            let Some(host) = parsed.host_str() else { return false };
            if options.include_subdomains {
                is_same_registrable_domain(host, url.host())
            } else {
                host == url.host()
            }
        })
        .collect();

    if let Some(search) = &options.search {
        let needle = search.to_ascii_lowercase();
        filtered.retain(|link| link.to_ascii_lowercase().contains(&needle));
    }

    let mut deduped = remove_duplicate_urls(&filtered);
    deduped.truncate(options.limit as usize);

    Ok(MapResult { links: deduped })
}

pub(crate) async fn fetch_sitemap_urls(client: &Client, seed: &url::Url) -> Vec<String> {
    let Ok(sitemap_url) = seed.join("/sitemap.xml") else { return Vec::new() };
    let Ok(response) = client.get(sitemap_url).send().await else { return Vec::new() };
    if !response.status().is_success() {
        return Vec::new();
    }
    let Ok(body) = response.text().await else { return Vec::new() };
    LOC_PATTERN.captures_iter(&body).map(|c| c[1].to_string()).collect()
}

async fn fetch_page_links(client: &Client, seed: &url::Url) -> Result<Vec<String>, ScrapeError> {
    let response = client
        .get(seed.clone())
        .send()
        .await
        .map_err(|e| ScrapeError::Engine(crate::error::EngineError::Internal(e.to_string())))?;
    let body = response
        .text()
        .await
        .map_err(|e| ScrapeError::Engine(crate::error::EngineError::Internal(e.to_string())))?;
    let parsed = Html::parse_document(&body);
    Ok(links::extract_links(&parsed, seed.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_pattern_extracts_urls_from_sitemap_body() {
        let body = "<urlset><url><loc>https://example.com/a</loc></url>\
                     <url><loc>https://example.com/b</loc></url></urlset>";
        let found: Vec<_> = LOC_PATTERN.captures_iter(body).map(|c| c[1].to_string()).collect();
        assert_eq!(found, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn default_options_limit_to_5000() {
        assert_eq!(MapOptions::default().limit, 5_000);
    }
}
