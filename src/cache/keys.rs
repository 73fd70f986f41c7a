//! Type-safe cache key builders

use std::fmt;

/// Namespace for idempotency result entries.
///
/// Keys render as `idemp:<token>`; the token is the caller-supplied
/// `Idempotency-Key` header value, stored opaque and unescaped.
pub const IDEMPOTENCY_NAMESPACE: &str = "idemp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    pub token: String,
}

impl IdempotencyKey {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", IDEMPOTENCY_NAMESPACE, self.token)
    }
}
