//! Health check module
//! Provides health status for the application and its one external
//! dependency, the Redis idempotency store.

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::cache::{self, RedisPool};

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone, Default)]
pub struct HealthChecker {
    cache_pool: Option<RedisPool>,
}

impl HealthChecker {
    pub fn new(cache_pool: Option<RedisPool>) -> Self {
        Self { cache_pool }
    }

    /// Check the idempotency store and aggregate an overall state.
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        match &self.cache_pool {
            Some(pool) => {
                let started = Instant::now();
                match timeout(Duration::from_secs(5), cache::health_check(pool)).await {
                    Ok(Ok(())) => {
                        let elapsed = started.elapsed().as_millis();
                        health_status
                            .checks
                            .insert("cache".to_string(), ComponentHealth::up(Some(elapsed)));
                        info!("Cache health check: OK ({}ms)", elapsed);
                    }
                    Ok(Err(e)) => {
                        warn!("Cache health check failed: {}", e);
                        health_status.status = HealthState::Unhealthy;
                        health_status
                            .checks
                            .insert("cache".to_string(), ComponentHealth::down(Some(e.to_string())));
                    }
                    Err(_) => {
                        warn!("Cache health check timed out");
                        health_status.status = HealthState::Unhealthy;
                        health_status.checks.insert(
                            "cache".to_string(),
                            ComponentHealth::down(Some("health check timed out".to_string())),
                        );
                    }
                }
            }
            None => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "cache".to_string(),
                    ComponentHealth::down(Some("cache pool not configured".to_string())),
                );
            }
        }

        health_status
    }
}
