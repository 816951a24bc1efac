//! Wire error envelope (§6): every failed response is `{success:false,
//! error:string}`, with the HTTP status taken from `ScrapeError::status_code`
//! / `CrawlJobError::status_code` (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{CrawlJobError, ScrapeError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { success: false, error: self.message })).into_response()
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError { status, message: err.to_string() }
    }
}

impl From<CrawlJobError> for ApiError {
    fn from(err: CrawlJobError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError { status, message: err.to_string() }
    }
}
