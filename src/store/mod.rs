//! Pluggable shared-store backend for the distributed limiter variant.
//!
//! `Store` is the seam between the distributed admission algorithm
//! (§4.5) and a concrete key-value backend. The only shipped
//! implementation is [`redis_store::RedisStore`], but tests exercise the
//! distributed limiter against an in-memory fake that never errors, and
//! (separately) one that always errors, to prove the fail-open contract
//! without a live store.

pub mod redis_store;

use async_trait::async_trait;

use crate::error::RateLimitError;

/// Outcome of the atomic check-and-admit script (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct StoreCheck {
    pub admitted: bool,
    pub remaining: u64,
    pub in_window: u64,
}

/// Read-only snapshot for `inspect()` — cardinality of the sorted set and
/// its remaining TTL, if any.
#[derive(Debug, Clone, Copy)]
pub struct StoreStatus {
    pub in_window: u64,
    pub ttl_secs: Option<i64>,
}

#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Execute the atomic five-step script from §4.5 against `client_id`'s
    /// sorted set.
    async fn check(
        &self,
        client_id: &str,
        now_ms: i64,
        window_ms: i64,
        capacity: u64,
    ) -> Result<StoreCheck, RateLimitError>;

    /// Delete the client's key.
    async fn reset(&self, client_id: &str) -> Result<(), RateLimitError>;

    /// Cardinality and TTL of the client's key.
    async fn inspect(&self, client_id: &str) -> Result<StoreStatus, RateLimitError>;
}
