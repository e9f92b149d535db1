use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use printwatch_core::{InventoryError, ScanError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("device inventory unavailable: {0}")]
    InventoryUnavailable(String),

    #[error("scan already in progress")]
    ScanInProgress,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Inventory(inner) => inner.into(),
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(e: InventoryError) -> Self {
        ApiError::InventoryUnavailable(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InventoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ScanInProgress => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "ok": false, "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
