//! Rate limiting algorithm variants (§4).
//!
//! Mirrors the tagged-variant dispatch shape used throughout the teacher
//! codebase for its `Filter` and `LoadBalancer` enums: a closed set of
//! known algorithms gets static dispatch through `Limiter`, and a
//! `Custom` variant carries a boxed [`LimiterOps`] trait object for
//! algorithms registered at runtime through `factory::Factory::register`.

pub mod distributed;
pub mod fixed_window;
pub mod gc;
pub mod leaky_bucket;
pub mod sliding_window;
pub mod token_bucket;

use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::decision::{Decision, Status};
use crate::error::RateLimitError;
use crate::policy::{Algorithm, Policy};
use crate::store::Store;

use distributed::DistributedLimiter;
use fixed_window::FixedWindowLimiter;
use leaky_bucket::LeakyBucketLimiter;
use sliding_window::SlidingWindowLimiter;
use token_bucket::TokenBucketLimiter;

/// Object-safe interface a registered custom algorithm must implement.
/// The five built-in algorithms don't go through this trait — they're
/// matched directly in `Limiter`'s dispatch methods — but a custom
/// registration has no closed variant to match on, so it needs dynamic
/// dispatch.
#[async_trait]
pub trait LimiterOps: Send + Sync + std::fmt::Debug {
    async fn decide(&self, client_id: &str) -> Decision;
    async fn reset(&self, client_id: &str);
    async fn inspect(&self, client_id: &str) -> Status;
}

/// A constructed, ready-to-use rate limiter for one policy.
#[derive(Debug)]
pub enum Limiter {
    TokenBucket(Arc<TokenBucketLimiter>),
    SlidingWindow(Arc<SlidingWindowLimiter>),
    LeakyBucket(Arc<LeakyBucketLimiter>),
    FixedWindow(Arc<FixedWindowLimiter>),
    Distributed(Arc<DistributedLimiter>),
    Custom(Arc<dyn LimiterOps>),
}

impl std::fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketLimiter").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for LeakyBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeakyBucketLimiter").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DistributedLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLimiter").finish_non_exhaustive()
    }
}

/// Rejects an empty client id before it reaches any limiter's per-client
/// map — an empty key would otherwise silently share state across every
/// unidentified caller (§7).
fn validate_client_id(client_id: &str) -> Result<(), RateLimitError> {
    if client_id.trim().is_empty() {
        return Err(RateLimitError::ClientId(
            "client id must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl Limiter {
    /// Build one of the four in-process algorithms from a validated,
    /// non-distributed policy and start its background GC sweep.
    pub fn new_local(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
        match &policy.algorithm {
            Algorithm::TokenBucket => {
                let limiter = Arc::new(TokenBucketLimiter::new(policy, clock));
                limiter.start_gc();
                Limiter::TokenBucket(limiter)
            }
            Algorithm::SlidingWindow | Algorithm::SlidingWindowLog => {
                let limiter = Arc::new(SlidingWindowLimiter::new(policy, clock));
                limiter.start_gc();
                Limiter::SlidingWindow(limiter)
            }
            Algorithm::LeakyBucket => {
                let limiter = Arc::new(LeakyBucketLimiter::new(policy, clock));
                limiter.start_gc();
                Limiter::LeakyBucket(limiter)
            }
            Algorithm::FixedWindow => {
                let limiter = Arc::new(FixedWindowLimiter::new(policy, clock));
                limiter.start_gc();
                Limiter::FixedWindow(limiter)
            }
            Algorithm::Custom(tag) => {
                unreachable!("custom algorithm tag {tag:?} must be resolved by the factory before new_local is called")
            }
        }
    }

    /// Build the distributed variant against an already-connected store.
    pub fn new_distributed(policy: &Policy, clock: Arc<dyn Clock>, store: Arc<dyn Store>) -> Self {
        Limiter::Distributed(Arc::new(DistributedLimiter::new(policy, clock, store)))
    }

    pub async fn decide(&self, client_id: &str) -> Result<Decision, RateLimitError> {
        validate_client_id(client_id)?;
        Ok(match self {
            Limiter::TokenBucket(l) => l.decide(client_id).await,
            Limiter::SlidingWindow(l) => l.decide(client_id).await,
            Limiter::LeakyBucket(l) => l.decide(client_id).await,
            Limiter::FixedWindow(l) => l.decide(client_id).await,
            Limiter::Distributed(l) => l.decide(client_id).await,
            Limiter::Custom(l) => l.decide(client_id).await,
        })
    }

    pub async fn reset(&self, client_id: &str) -> Result<(), RateLimitError> {
        validate_client_id(client_id)?;
        match self {
            Limiter::TokenBucket(l) => l.reset(client_id).await,
            Limiter::SlidingWindow(l) => l.reset(client_id).await,
            Limiter::LeakyBucket(l) => l.reset(client_id).await,
            Limiter::FixedWindow(l) => l.reset(client_id).await,
            Limiter::Distributed(l) => l.reset(client_id).await,
            Limiter::Custom(l) => l.reset(client_id).await,
        }
        Ok(())
    }

    pub async fn inspect(&self, client_id: &str) -> Result<Status, RateLimitError> {
        validate_client_id(client_id)?;
        Ok(match self {
            Limiter::TokenBucket(l) => l.inspect(client_id).await,
            Limiter::SlidingWindow(l) => l.inspect(client_id).await,
            Limiter::LeakyBucket(l) => l.inspect(client_id).await,
            Limiter::FixedWindow(l) => l.inspect(client_id).await,
            Limiter::Distributed(l) => l.inspect(client_id).await,
            Limiter::Custom(l) => l.inspect(client_id).await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn policy(algorithm: Algorithm) -> Policy {
        Policy::new(5, 10.0, algorithm, None, None, false, None).unwrap()
    }

    #[tokio::test]
    async fn rejects_empty_client_id() {
        let limiter = Limiter::new_local(&policy(Algorithm::TokenBucket), Arc::new(MockClock::new()));
        let err = limiter.decide("").await.unwrap_err();
        assert!(matches!(err, RateLimitError::ClientId(_)));
    }

    #[tokio::test]
    async fn dispatches_to_the_right_variant() {
        let limiter = Limiter::new_local(&policy(Algorithm::FixedWindow), Arc::new(MockClock::new()));
        assert!(matches!(limiter, Limiter::FixedWindow(_)));
        let status = limiter.inspect("c").await.unwrap();
        assert_eq!(status.algorithm, "fixed_window");
    }

    #[tokio::test]
    async fn sliding_window_log_alias_dispatches_to_sliding_window() {
        let limiter = Limiter::new_local(&policy(Algorithm::SlidingWindowLog), Arc::new(MockClock::new()));
        assert!(matches!(limiter, Limiter::SlidingWindow(_)));
    }
}
