//! Integration tests for the POST /pay endpoint

use axum::{
    body::Body,
    routing::{get, post},
    Router,
};
use http::{Request, StatusCode};
use idempay_backend::api::payments::{self, PaymentsState};
use async_trait::async_trait;
use idempay_backend::cache::store::UnavailableStore;
use idempay_backend::cache::{
    CacheError, CacheResult, IdempotencyStore, InMemoryIdempotencyStore, SetOutcome,
};
use idempay_backend::services::transaction::{
    OutcomeDecider, TransactionProcessor, TransactionStatus,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Decider that counts invocations, to prove the processor runs at most
/// once per token.
struct CountingDecider {
    calls: AtomicUsize,
    status: TransactionStatus,
}

impl CountingDecider {
    fn success() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            status: TransactionStatus::Success,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OutcomeDecider for CountingDecider {
    fn decide(&self, _amount: f64) -> TransactionStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status
    }
}

/// Store double simulating a concurrent writer installing its result
/// between this request's lookup miss and its write.
struct RacedStore {
    winner: String,
}

#[async_trait]
impl IdempotencyStore for RacedStore {
    async fn get(&self, _token: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set_if_absent(
        &self,
        _token: &str,
        _body: &str,
        _ttl: Duration,
    ) -> CacheResult<SetOutcome> {
        Ok(SetOutcome::AlreadyExists(self.winner.clone()))
    }
}

/// Store double that misses on lookup but fails the write.
struct WriteFailsStore;

#[async_trait]
impl IdempotencyStore for WriteFailsStore {
    async fn get(&self, _token: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set_if_absent(
        &self,
        _token: &str,
        _body: &str,
        _ttl: Duration,
    ) -> CacheResult<SetOutcome> {
        Err(CacheError::ConnectionError("store unreachable".to_string()))
    }
}

fn build_app(store: Arc<dyn IdempotencyStore>, decider: Arc<dyn OutcomeDecider>) -> Router {
    build_app_with_ttl(store, decider, Duration::from_secs(86_400))
}

fn build_app_with_ttl(
    store: Arc<dyn IdempotencyStore>,
    decider: Arc<dyn OutcomeDecider>,
    ttl: Duration,
) -> Router {
    let state = PaymentsState {
        store,
        processor: Arc::new(TransactionProcessor::new(decider)),
        result_ttl: ttl,
    };
    Router::new()
        .route("/", get(payments::root))
        .route("/pay", post(payments::pay))
        .with_state(state)
}

fn pay_request(token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/pay")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Idempotency-Key", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn successful_payment_has_expected_shape() {
    let app = build_app(
        Arc::new(InMemoryIdempotencyStore::new()),
        CountingDecider::success(),
    );

    let response = app
        .oneshot(pay_request(Some("abc123"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();

    assert_eq!(body["amount"], json!(10.5));
    assert!(
        body["status"] == "SUCCESS" || body["status"] == "FAILED",
        "unexpected status: {}",
        body["status"]
    );
    Uuid::parse_str(body["transaction_id"].as_str().unwrap()).unwrap();
}

#[tokio::test]
async fn retry_returns_byte_identical_body_without_reprocessing() {
    let store: Arc<InMemoryIdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
    let decider = CountingDecider::success();
    let app = build_app(store.clone(), decider.clone());

    let first = app
        .clone()
        .oneshot(pay_request(Some("abc123"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = body_bytes(first).await;

    let second = app
        .oneshot(pay_request(Some("abc123"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(decider.calls(), 1);
}

#[tokio::test]
async fn retry_with_different_body_still_returns_first_result() {
    let decider = CountingDecider::success();
    let app = build_app(Arc::new(InMemoryIdempotencyStore::new()), decider.clone());

    let first = app
        .clone()
        .oneshot(pay_request(Some("tok-1"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();
    let first_body = body_bytes(first).await;

    let second = app
        .oneshot(pay_request(Some("tok-1"), r#"{"amount": 999.99}"#))
        .await
        .unwrap();
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(decider.calls(), 1);
}

#[tokio::test]
async fn missing_idempotency_key_is_rejected_before_any_work() {
    let store: Arc<InMemoryIdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
    let decider = CountingDecider::success();
    let app = build_app(store.clone(), decider.clone());

    let response = app
        .oneshot(pay_request(None, r#"{"amount": 10.50}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        body,
        json!({"error": "Idempotency-Key header is required"})
    );
    assert_eq!(decider.calls(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn empty_idempotency_key_counts_as_missing() {
    let app = build_app(
        Arc::new(InMemoryIdempotencyStore::new()),
        CountingDecider::success(),
    );

    let response = app
        .oneshot(pay_request(Some(""), r#"{"amount": 10.50}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        body,
        json!({"error": "Idempotency-Key header is required"})
    );
}

#[tokio::test]
async fn invalid_bodies_are_rejected_without_caching() {
    let cases = [
        r#"{"amount": -5}"#,
        r#"{"amount": 0}"#,
        r#"{}"#,
        r#"{"amount": "ten"}"#,
        r#"not json at all"#,
        r#""#,
    ];

    for case in cases {
        let store: Arc<InMemoryIdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let decider = CountingDecider::success();
        let app = build_app(store.clone(), decider.clone());

        let response = app
            .oneshot(pay_request(Some("tok-invalid"), case))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {case}");
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"error": "Invalid request data"}), "body: {case}");
        assert_eq!(decider.calls(), 0, "body: {case}");
        assert!(store.is_empty(), "body: {case}");
    }
}

#[tokio::test]
async fn corrected_retry_succeeds_after_invalid_attempt() {
    let decider = CountingDecider::success();
    let app = build_app(Arc::new(InMemoryIdempotencyStore::new()), decider.clone());

    let invalid = app
        .clone()
        .oneshot(pay_request(Some("tok-retry"), r#"{"amount": -5}"#))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let corrected = app
        .oneshot(pay_request(Some("tok-retry"), r#"{"amount": 5}"#))
        .await
        .unwrap();
    assert_eq!(corrected.status(), StatusCode::OK);
    assert_eq!(decider.calls(), 1);
}

#[tokio::test]
async fn numeric_string_amount_is_accepted_and_echoed() {
    let app = build_app(
        Arc::new(InMemoryIdempotencyStore::new()),
        CountingDecider::success(),
    );

    let response = app
        .oneshot(pay_request(Some("tok-str"), r#"{"amount": "7.25"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["amount"], json!(7.25));
}

#[tokio::test]
async fn unreachable_store_fails_the_request() {
    let decider = CountingDecider::success();
    let app = build_app(Arc::new(UnavailableStore), decider.clone());

    let response = app
        .oneshot(pay_request(Some("tok-down"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"error": "Idempotency store unavailable"}));
    // The lookup failed, so processing never started.
    assert_eq!(decider.calls(), 0);
}

#[tokio::test]
async fn losing_the_store_race_returns_the_winners_body() {
    let winner =
        r#"{"transaction_id":"00000000-0000-0000-0000-000000000000","amount":10.5,"status":"FAILED"}"#;
    let decider = CountingDecider::success();
    let app = build_app(
        Arc::new(RacedStore {
            winner: winner.to_string(),
        }),
        decider.clone(),
    );

    let response = app
        .oneshot(pay_request(Some("tok-race"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();

    // The local result is discarded; the winner's body is canonical.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, winner.as_bytes());
    assert_eq!(decider.calls(), 1);
}

#[tokio::test]
async fn store_failure_on_write_fails_the_request_after_one_attempt() {
    let decider = CountingDecider::success();
    let app = build_app(Arc::new(WriteFailsStore), decider.clone());

    let response = app
        .oneshot(pay_request(Some("tok-write-down"), r#"{"amount": 10.50}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"error": "Idempotency store unavailable"}));
    // Processing happened exactly once before the failed write; no retry.
    assert_eq!(decider.calls(), 1);
}

#[tokio::test]
async fn expired_token_is_processed_as_new() {
    let decider = CountingDecider::success();
    let app = build_app_with_ttl(
        Arc::new(InMemoryIdempotencyStore::new()),
        decider.clone(),
        Duration::from_millis(40),
    );

    let first = app
        .clone()
        .oneshot(pay_request(Some("tok-ttl"), r#"{"amount": 3.00}"#))
        .await
        .unwrap();
    let first_body: Value = serde_json::from_slice(&body_bytes(first).await).unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let second = app
        .oneshot(pay_request(Some("tok-ttl"), r#"{"amount": 3.00}"#))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body: Value = serde_json::from_slice(&body_bytes(second).await).unwrap();

    assert_eq!(decider.calls(), 2);
    assert_ne!(first_body["transaction_id"], second_body["transaction_id"]);
}

#[tokio::test]
async fn root_reports_service_info() {
    let app = build_app(
        Arc::new(InMemoryIdempotencyStore::new()),
        CountingDecider::success(),
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["service"], "Payment API");
    assert_eq!(body["message"], "Service is running");
}
