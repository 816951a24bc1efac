//! `POST /v1/scrape` (§6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::engine::abort::AbortInstance;
use crate::error::AbortTier;
use crate::model::{Document, ScrapeOptions};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(flatten)]
    pub options: ScrapeOptions,
    /// Overrides `options.timeoutMs` when present, matching the
    /// `{url, ...ScrapeOptions, timeout?}` request shape in §6.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub data: Document,
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let mut options = request.options;
    if let Some(timeout) = request.timeout {
        options.timeout_ms = Some(timeout);
    }

    let _guard = state.track_scrape();
    let external_abort = AbortInstance::root(AbortTier::External, Some(options.timeout()));
    let document = state.orchestrator.scrape(&request.url, options, &external_abort).await?;
    Ok(Json(ScrapeResponse { success: true, data: document }))
}
