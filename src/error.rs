//! Application error handling
//!
//! Unified error type for the request boundary: client input faults map to
//! 4xx with the fixed wire bodies, store failures map to 503. A cache
//! outage must surface as a failure, never as a cache miss, or the
//! deduplication guarantee is lost.

use crate::cache::CacheError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request arrived without the deduplication token.
    #[error("Idempotency-Key header is required")]
    MissingIdempotencyKey,

    /// Body absent, unparseable, or failed payment-schema validation.
    #[error("Invalid request data")]
    InvalidRequest,

    /// The idempotency store could not be reached or failed an operation.
    #[error("Idempotency store unavailable")]
    CacheUnavailable(#[from] CacheError),

    /// Local fault (result serialization) before the store write; not a
    /// store failure.
    #[error("Internal server error")]
    Internal(#[source] serde_json::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingIdempotencyKey | AppError::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            AppError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the caller. Store failures get a fixed message so
    /// internal details never leak to clients.
    pub fn user_message(&self) -> String {
        match self {
            AppError::CacheUnavailable(_) => "Idempotency store unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

/// Wire shape for all error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Client faults are not failures of the system itself.
        if status.is_server_error() {
            tracing::error!(error = ?self, status = %status.as_u16(), "Server error occurred");
        } else {
            tracing::warn!(error = ?self, status = %status.as_u16(), "Client error occurred");
        }

        let body = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}
