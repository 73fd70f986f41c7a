//! Payment submission endpoint
//!
//! `POST /pay` is the single write operation, guarded end to end by the
//! idempotency token: a retried request is answered from the store with
//! the byte-identical first response and never re-enters validation or
//! processing. Cached bodies are trusted internal data and returned
//! verbatim.

use crate::cache::{IdempotencyStore, SetOutcome};
use crate::error::AppError;
use crate::services::transaction::TransactionProcessor;
use crate::services::validation::validate_payment;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Header carrying the caller-supplied deduplication token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// State for the payments API
#[derive(Clone)]
pub struct PaymentsState {
    pub store: Arc<dyn IdempotencyStore>,
    pub processor: Arc<TransactionProcessor>,
    /// Retention window for stored results
    pub result_ttl: Duration,
}

/// Liveness/info payload for the root endpoint
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub message: &'static str,
}

/// `GET /` — liveness/info, no side effects.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "Payment API",
        message: "Service is running",
    })
}

/// `POST /pay` — submit a payment, safe to retry.
///
/// Per-request state machine: RequireToken → CacheLookup → Validate →
/// Process → StoreAndRespond. Only the final path touches the cache or
/// the processor; validation failures leave the token unclaimed so a
/// corrected retry can still succeed.
pub async fn pay(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
        .ok_or(AppError::MissingIdempotencyKey)?
        .to_string();

    if let Some(cached) = state.store.get(&token).await? {
        info!(token = %token, "Idempotent replay served from cache");
        return Ok(json_response(cached));
    }

    let payload: Option<Value> = serde_json::from_slice(&body).ok();
    let request = validate_payment(payload.as_ref()).ok_or_else(|| {
        warn!(token = %token, "Invalid payment request");
        AppError::InvalidRequest
    })?;

    let result = state.processor.process(request.amount);
    let serialized = serde_json::to_string(&result).map_err(AppError::Internal)?;

    let canonical = match state
        .store
        .set_if_absent(&token, &serialized, state.result_ttl)
        .await?
    {
        SetOutcome::Stored => {
            // Audit record for the completed transaction.
            info!(
                transaction_id = %result.transaction_id,
                amount = result.amount,
                status = result.status.as_str(),
                "Transaction completed"
            );
            serialized
        }
        SetOutcome::AlreadyExists(winner) => {
            // A concurrent request with the same token won the store race;
            // its result is canonical and ours is discarded.
            warn!(token = %token, "Duplicate in flight, returning stored result");
            winner
        }
    };

    Ok(json_response(canonical))
}

fn json_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
