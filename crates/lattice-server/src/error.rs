//! Error types for the REST layer.
//!
//! [`ApiError`] renders every failure as the JSON body browser clients
//! already understand:
//!
//! ```json
//! { "ok": false, "code": 404, "message": "Not Found", "error": "..." }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use validator::ValidationErrors;

/// Errors that can occur in the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// The request body could not be parsed.
    #[error("{0}")]
    BadRequest(String),

    /// The request body parsed but failed validation.
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    code: u16,
    message: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let issues = match &self {
            Self::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        let body = ErrorBody {
            ok: false,
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or_default(),
            error: self.to_string(),
            issues,
        };
        (status, Json(body)).into_response()
    }
}
