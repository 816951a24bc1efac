//! HTTP API (§6): the `/v1/*` surface wired the way the teacher wires its
//! MCP HTTP routes in `mcp-server/src/main.rs` — one `axum::Router`, a
//! permissive CORS layer, and `TraceLayer` for request logging.

pub mod crawl;
pub mod error;
pub mod map;
pub mod scrape;
pub mod status;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/scrape", post(scrape::handle))
        .route("/v1/map", post(map::handle))
        .route("/v1/crawl", post(crawl::start))
        .route("/v1/crawl/{id}", get(crawl::status).delete(crawl::cancel))
        .route("/v1/crawl/{id}/errors", get(crawl::errors))
        .route("/v1/concurrency-check", get(status::concurrency_check))
        .route("/is-production", get(status::is_production))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
