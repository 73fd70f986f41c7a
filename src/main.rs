use axum::{
    routing::{get, post},
    Json, Router,
};
use idempay_backend::api::payments::{self, PaymentsState};
use idempay_backend::cache::{self, CacheConfig, RedisIdempotencyStore};
use idempay_backend::config::AppConfig;
use idempay_backend::health::{HealthChecker, HealthStatus};
use idempay_backend::logging::init_tracing;
use idempay_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use idempay_backend::services::transaction::TransactionProcessor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // AppConfig::from_env owns .env loading.
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Starting idempay backend service"
    );

    info!("🔄 Initializing Redis cache connection pool...");
    let cache_config = CacheConfig {
        redis_url: config.cache.redis_url.clone(),
        max_connections: config.cache.max_connections,
        ..Default::default()
    };
    let cache_pool = cache::init_cache_pool(cache_config).await.map_err(|e| {
        error!("Failed to initialize cache pool: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!(redis_url = %config.cache.redis_url, "✅ Cache connection pool initialized");

    let payments_state = PaymentsState {
        store: Arc::new(RedisIdempotencyStore::new(cache_pool.clone())),
        processor: Arc::new(TransactionProcessor::simulated()),
        result_ttl: Duration::from_secs(config.cache.idempotency_ttl_secs),
    };

    let health_checker = HealthChecker::new(Some(cache_pool.clone()));

    let payment_routes = Router::new()
        .route("/", get(payments::root))
        .route("/pay", post(payments::pay))
        .with_state(payments_state);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(health_checker);

    let app = payment_routes
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache::shutdown_cache_pool(&cache_pool).await;
    info!("👋 Server shutdown complete");

    Ok(())
}

async fn health(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = checker.check_health().await;

    if health_status.is_healthy() {
        Ok(Json(health_status))
    } else {
        error!("❌ Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> &'static str {
    "OK"
}
