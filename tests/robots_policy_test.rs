//! Exercises `RobotsPolicy` against a real HTTP server (§4.B) rather than the
//! pure `RobotsRules::parse` unit tests already colocated in `src/robots.rs`:
//! fetch, parse, cache, and fail-open behavior all go through an actual
//! `reqwest::Client` request here, using `wiremock` to stand up the
//! `robots.txt` fixture without networking out. `ScrapeUrl::validate` blocks
//! loopback hosts outright (§4.A policy blocklist), so `RobotsPolicy` — which
//! takes a bare `url::Url` — is the seam this layer can actually exercise
//! against a local mock server.

use std::time::Duration;

use firecrawl_core::robots::RobotsPolicy;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn policy() -> RobotsPolicy {
    RobotsPolicy::with_ttl(reqwest::Client::new(), Duration::from_secs(60))
}

#[tokio::test]
async fn disallowed_path_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"))
        .mount(&server)
        .await;

    let policy = policy();
    let allowed = url::Url::parse(&format!("{}/public/page", server.uri())).unwrap();
    let blocked = url::Url::parse(&format!("{}/private/page", server.uri())).unwrap();

    assert!(policy.is_allowed(&allowed).await);
    assert!(!policy.is_allowed(&blocked).await);
}

#[tokio::test]
async fn missing_robots_txt_fails_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/robots.txt")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let policy = policy();
    let url = url::Url::parse(&format!("{}/anything", server.uri())).unwrap();

    assert!(policy.is_allowed(&url).await);
}

#[tokio::test]
async fn server_error_fails_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/robots.txt")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let policy = policy();
    let url = url::Url::parse(&format!("{}/page", server.uri())).unwrap();

    assert!(policy.is_allowed(&url).await);
}

#[tokio::test]
async fn crawl_delay_is_parsed_from_fetched_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 2\n"))
        .mount(&server)
        .await;

    let policy = policy();
    let url = url::Url::parse(&server.uri()).unwrap();

    assert_eq!(policy.crawl_delay(&url).await, Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn result_is_cached_across_calls_to_the_same_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /blocked\n"))
        .expect(1)
        .mount(&server)
        .await;

    let policy = policy();
    let url_a = url::Url::parse(&format!("{}/one", server.uri())).unwrap();
    let url_b = url::Url::parse(&format!("{}/two", server.uri())).unwrap();

    assert!(policy.is_allowed(&url_a).await);
    assert!(policy.is_allowed(&url_b).await);
    // wiremock's `.expect(1)` on the Mock is verified when `server` drops,
    // asserting the second call was served from the per-host cache.
}

#[tokio::test]
async fn filter_links_drops_disallowed_cross_host_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin/\n"))
        .mount(&server)
        .await;

    let policy = policy();
    let links = vec![
        format!("{}/admin/secrets", server.uri()),
        format!("{}/public/page", server.uri()),
        "not a url".to_string(),
    ];

    let (kept, denied) = policy.filter_links_with_reasons(links).await;

    assert_eq!(kept, vec![format!("{}/public/page", server.uri())]);
    assert_eq!(denied.get(&format!("{}/admin/secrets", server.uri())).copied(), Some("ROBOTS_TXT"));
}
