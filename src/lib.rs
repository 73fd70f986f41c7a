//! Idempotent payment API backend
//!
//! A single write operation (`POST /pay`) deduplicated by a caller-supplied
//! idempotency token, backed by a time-bounded Redis store.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod services;
