//! `GET /v1/concurrency-check` and `GET /is-production` (§6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyCheckResponse {
    pub success: bool,
    pub concurrency: usize,
    pub max_concurrency: usize,
}

pub async fn concurrency_check(State(state): State<Arc<AppState>>) -> Json<ConcurrencyCheckResponse> {
    Json(ConcurrencyCheckResponse {
        success: true,
        concurrency: state.active_scrape_count(),
        max_concurrency: state.config.max_concurrency,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsProductionResponse {
    pub is_production: bool,
}

pub async fn is_production(State(state): State<Arc<AppState>>) -> Json<IsProductionResponse> {
    Json(IsProductionResponse { is_production: state.config.is_production })
}
