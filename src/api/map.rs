//! `POST /v1/map` (§6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::map::{self, MapOptions};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    pub url: String,
    #[serde(flatten)]
    pub options: MapOptions,
    /// Accepted for parity with §6's request shape; map requests have no
    /// long-running engine waterfall to bound, so it is currently unused.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub success: bool,
    pub links: Vec<String>,
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MapRequest>,
) -> Result<Json<MapResponse>, ApiError> {
    let result = map::map(&state.http_client, &request.url, &request.options).await?;
    Ok(Json(MapResponse { success: true, links: result.links }))
}
