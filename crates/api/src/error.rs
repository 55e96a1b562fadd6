//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use domain::DomainError;
use serde::Serialize;
use store::StoreError;

/// JSON body of every error response.
///
/// `path` and `request_id` are filled in by the request-context middleware,
/// which sees the request the handler no longer has.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub path: Option<String>,
    pub code: &'static str,
    pub message: String,
    pub request_id: Option<String>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or_default().to_string(),
            path: None,
            code,
            message: message.into(),
            request_id: None,
        }
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed input: unparseable ids, bodies or query parameters.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl ApiError {
    /// Returns the status, error code and client-facing message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Domain(err) => domain_error_parts(err),
        }
    }
}

fn domain_error_parts(err: &DomainError) -> (StatusCode, &'static str, String) {
    match err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        err if err.is_conflict() => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        DomainError::InvalidArgument(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        DomainError::Store(StoreError::UniqueViolation { .. }) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Resource already exists".to_string(),
        ),
        DomainError::Store(StoreError::ForeignKeyViolation { .. }) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Resource is referenced by other records".to_string(),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = ?self, "internal server error");
        } else {
            tracing::warn!(%status, code, %message, "request rejected");
        }

        let body = ErrorBody::new(status, code, message);
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
