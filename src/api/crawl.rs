//! `POST /v1/crawl`, `GET /v1/crawl/{id}`, `DELETE /v1/crawl/{id}`, and
//! `GET /v1/crawl/{id}/errors` (§6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::error::CrawlJobError;
use crate::model::{CrawlErrorsResponse, CrawlStatus, CrawlerOptions, Document};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    pub url: String,
    #[serde(flatten)]
    pub options: CrawlerOptions,
}

#[derive(Debug, Serialize)]
pub struct CrawlStartResponse {
    pub success: bool,
    pub id: Uuid,
    pub url: String,
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CrawlRequest>,
) -> Result<Json<CrawlStartResponse>, ApiError> {
    let id = state.coordinator.start(vec![request.url], request.options).await?;
    Ok(Json(CrawlStartResponse { success: true, id, url: format!("/v1/crawl/{id}") }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStatusResponse {
    pub success: bool,
    pub status: CrawlStatus,
    pub completed: u32,
    pub total: u32,
    /// No real billing model exists in this crate (§1 Non-goals); reported
    /// as `completed` so the field is present with a value that tracks
    /// actual work done, matching the shape the SDK mirror expects.
    pub credits_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub data: Vec<Document>,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CrawlStatusResponse>, ApiError> {
    let job = state.store.get(id).await.ok_or(CrawlJobError::NotFound)?;
    let data = state.store.documents(id).await;
    Ok(Json(CrawlStatusResponse {
        success: true,
        status: job.status,
        completed: job.completed,
        total: job.total,
        credits_used: job.completed,
        expires_at: None,
        next: None,
        data,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub status: &'static str,
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    if state.store.get(id).await.is_none() {
        return Err(CrawlJobError::NotFound.into());
    }
    state.coordinator.cancel(id)?;
    Ok(Json(CancelResponse { status: "cancelled" }))
}

pub async fn errors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CrawlErrorsResponse>, ApiError> {
    let job = state.store.get(id).await.ok_or(CrawlJobError::NotFound)?;
    let errors = state.store.errors(id).await;
    Ok(Json(CrawlErrorsResponse { errors, robots_blocked: job.robots_blocked }))
}
