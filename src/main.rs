use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use firecrawl_core::config::Config;
use firecrawl_core::engine::fetchers::{BrowserFetcher, HttpFetcher, IndexFetcher, PdfFetcher};
use firecrawl_core::engine::registry::Engine;
use firecrawl_core::engine::ScrapeOrchestrator;
use firecrawl_core::job::{JobAdapter, WebhookEmitter};
use firecrawl_core::robots::RobotsPolicy;
use firecrawl_core::store::InMemoryJobStore;
use firecrawl_core::{api, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env();
    let http_client = reqwest::Client::builder().build()?;

    let mut fetchers: BTreeMap<Engine, Arc<dyn firecrawl_core::engine::Fetcher>> = BTreeMap::new();
    fetchers.insert(Engine::FetchHttp, Arc::new(HttpFetcher::plain(http_client.clone())));
    fetchers.insert(
        Engine::FetchProxy,
        Arc::new(HttpFetcher::proxied(http_client.clone(), http_client.clone(), http_client.clone())),
    );
    fetchers.insert(Engine::BrowserCdp, Arc::new(BrowserFetcher::cdp()));
    fetchers.insert(Engine::BrowserStealth, Arc::new(BrowserFetcher::stealth()));
    fetchers.insert(Engine::PdfFetch, Arc::new(PdfFetcher::new(http_client.clone())));
    fetchers.insert(Engine::Index, Arc::new(IndexFetcher::disabled()));

    let robots = RobotsPolicy::with_ttl(http_client.clone(), config.robots_cache_ttl);
    let orchestrator = Arc::new(ScrapeOrchestrator::new(fetchers, robots.clone()));

    let store = Arc::new(InMemoryJobStore::new());
    let jobs = Arc::new(JobAdapter::new());
    let webhooks = WebhookEmitter::new(http_client.clone(), config.webhook_signing_key.clone());

    let port = config.port;
    let state = Arc::new(AppState::new(http_client, config, orchestrator, robots, store, jobs, webhooks));

    let app: Router = api::router(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("firecrawl-core listening on http://{bind_addr}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
