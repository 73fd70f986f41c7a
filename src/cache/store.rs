//! Idempotency store contract and implementations
//!
//! The store maps an idempotency token to the serialized response body of
//! the first execution. Writes go through an atomic set-if-absent so two
//! concurrent requests bearing the same fresh token can never each install
//! their own result: the first write wins and the loser is handed the
//! winning body.

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::keys::IdempotencyKey;
use crate::cache::RedisPool;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of an atomic set-if-absent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// This caller's value was stored and is now canonical.
    Stored,
    /// A concurrent writer won; the stored body is returned so the caller
    /// can respond with it and discard its own result.
    AlreadyExists(String),
}

/// Boundary over the external key-value store backing deduplication.
///
/// `Err` means the store itself failed; a missing key is `Ok(None)`. The
/// caller must treat errors as fatal for the request, never as a miss.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Fetch the stored body for a token, if present and unexpired.
    async fn get(&self, token: &str) -> CacheResult<Option<String>>;

    /// Atomically store `body` under the token unless a value already
    /// exists, with an absolute expiry of `ttl`.
    async fn set_if_absent(
        &self,
        token: &str,
        body: &str,
        ttl: Duration,
    ) -> CacheResult<SetOutcome>;
}

/// Production store over the bb8 Redis pool.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    pool: RedisPool,
}

impl RedisIdempotencyStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn get(&self, token: &str) -> CacheResult<Option<String>> {
        let key = IdempotencyKey::new(token).to_string();
        let mut conn = self.pool.get().await?;

        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut *conn)
            .await?;

        debug!(key = %key, hit = value.is_some(), "Idempotency store lookup");
        Ok(value)
    }

    async fn set_if_absent(
        &self,
        token: &str,
        body: &str,
        ttl: Duration,
    ) -> CacheResult<SetOutcome> {
        let key = IdempotencyKey::new(token).to_string();
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.pool.get().await?;

        // SET NX EX replies OK when the write won and nil when a value
        // already existed under the key.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(body)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut *conn)
            .await?;

        if reply.is_some() {
            debug!(key = %key, ttl_secs, "Idempotency result stored");
            return Ok(SetOutcome::Stored);
        }

        let existing: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut *conn)
            .await?;

        match existing {
            Some(winner) => Ok(SetOutcome::AlreadyExists(winner)),
            // The winning entry expired between the NX miss and the read;
            // install our value plainly rather than looping.
            None => {
                let _: () = redis::cmd("SET")
                    .arg(&key)
                    .arg(body)
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut *conn)
                    .await?;
                Ok(SetOutcome::Stored)
            }
        }
    }
}

/// In-memory store with real TTL semantics, used in tests and local runs
/// without Redis.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("poisoned idempotency store")
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, token: &str) -> CacheResult<Option<String>> {
        let key = IdempotencyKey::new(token).to_string();
        let guard = self.entries.lock().expect("poisoned idempotency store");
        Ok(guard
            .get(&key)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(body, _)| body.clone()))
    }

    async fn set_if_absent(
        &self,
        token: &str,
        body: &str,
        ttl: Duration,
    ) -> CacheResult<SetOutcome> {
        let key = IdempotencyKey::new(token).to_string();
        let now = Instant::now();
        let mut guard = self.entries.lock().expect("poisoned idempotency store");

        if let Some((existing, deadline)) = guard.get(&key) {
            if *deadline > now {
                return Ok(SetOutcome::AlreadyExists(existing.clone()));
            }
        }

        guard.insert(key, (body.to_string(), now + ttl));
        Ok(SetOutcome::Stored)
    }
}

/// Store double that fails every operation, for exercising the
/// hard-dependency path.
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[async_trait]
impl IdempotencyStore for UnavailableStore {
    async fn get(&self, _token: &str) -> CacheResult<Option<String>> {
        Err(CacheError::ConnectionError(
            "store unreachable".to_string(),
        ))
    }

    async fn set_if_absent(
        &self,
        _token: &str,
        _body: &str,
        _ttl: Duration,
    ) -> CacheResult<SetOutcome> {
        Err(CacheError::ConnectionError(
            "store unreachable".to_string(),
        ))
    }
}
