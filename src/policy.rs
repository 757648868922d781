use serde::{Deserialize, Serialize};

use crate::error::RateLimitError;

/// Rate limiting algorithm tag. `SlidingWindowLog` is kept as a distinct
/// variant because the source config schema declares it separately from
/// `SlidingWindow`, but both dispatch to the same timestamp-log
/// implementation (see `limiter::sliding_window`) — there is no behavioral
/// difference, only a naming one the distilled config preserves.
///
/// `Custom` carries a free-form tag for algorithms registered at runtime
/// through `factory::Factory::register` — it's not one of the five the
/// engine ships, so there's no built-in dispatch for it; the Factory looks
/// the tag up in its registry instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    TokenBucket,
    SlidingWindow,
    LeakyBucket,
    FixedWindow,
    SlidingWindowLog,
    Custom(String),
}

impl Algorithm {
    pub fn as_str(&self) -> &str {
        match self {
            Algorithm::TokenBucket => "token_bucket",
            Algorithm::SlidingWindow => "sliding_window",
            Algorithm::LeakyBucket => "leaky_bucket",
            Algorithm::FixedWindow => "fixed_window",
            Algorithm::SlidingWindowLog => "sliding_window_log",
            Algorithm::Custom(tag) => tag.as_str(),
        }
    }

    /// Parse one of the five built-in tags. Anything else is assumed to be
    /// a registered custom tag and returned as `Algorithm::Custom` — the
    /// Factory is the one that actually knows whether it's registered, and
    /// rejects it with `RateLimitError::Config` if not.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "token_bucket" => Algorithm::TokenBucket,
            "sliding_window" => Algorithm::SlidingWindow,
            "leaky_bucket" => Algorithm::LeakyBucket,
            "fixed_window" => Algorithm::FixedWindow,
            "sliding_window_log" => Algorithm::SlidingWindowLog,
            other => Algorithm::Custom(other.to_string()),
        }
    }
}

/// Immutable description of a rate-limit rule.
///
/// Construct via [`Policy::new`], which defaults `burst`/`refill_rate` and
/// validates the result — a `Policy` value that exists has already passed
/// `validate()`, so limiters never re-check these invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub capacity: u64,
    pub window: f64,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub burst: Option<u64>,
    #[serde(default)]
    pub refill_rate: Option<f64>,
    #[serde(default)]
    pub distributed: bool,
    #[serde(default)]
    pub store_endpoint: Option<String>,
}

impl Policy {
    /// Build and validate a policy, applying the `burst`/`refill_rate`
    /// defaults described in §3 of the spec before validating.
    pub fn new(
        capacity: u64,
        window: f64,
        algorithm: Algorithm,
        burst: Option<u64>,
        refill_rate: Option<f64>,
        distributed: bool,
        store_endpoint: Option<String>,
    ) -> Result<Self, RateLimitError> {
        let policy = Policy {
            capacity,
            window,
            algorithm,
            burst,
            refill_rate,
            distributed,
            store_endpoint,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Effective burst ceiling: defaults to `capacity` when unset.
    pub fn effective_burst(&self) -> u64 {
        self.burst.unwrap_or(self.capacity)
    }

    /// Effective refill rate in tokens/sec: defaults to `capacity / window`.
    pub fn effective_refill_rate(&self) -> f64 {
        self.refill_rate
            .unwrap_or(self.capacity as f64 / self.window)
    }

    /// Leak rate in requests/sec, always `capacity / window`.
    pub fn leak_rate(&self) -> f64 {
        self.capacity as f64 / self.window
    }

    /// Validate invariants from §3: positive capacity/window, `burst >=
    /// capacity`, `refill_rate > 0` after defaulting. `window == 0` is
    /// rejected for every algorithm (see SPEC_FULL §9 open question).
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.capacity == 0 {
            return Err(RateLimitError::Config(
                "capacity must be positive".to_string(),
            ));
        }
        if !(self.window > 0.0) {
            return Err(RateLimitError::Config(
                "window must be a positive duration".to_string(),
            ));
        }
        let burst = self.effective_burst();
        if burst < self.capacity {
            return Err(RateLimitError::Config(format!(
                "burst ({}) must be >= capacity ({})",
                burst, self.capacity
            )));
        }
        let refill_rate = self.effective_refill_rate();
        if !(refill_rate > 0.0) {
            return Err(RateLimitError::Config(
                "refill_rate must be positive after defaulting".to_string(),
            ));
        }
        if self.distributed && self.store_endpoint.is_none() {
            return Err(RateLimitError::Config(
                "distributed policies require a store_endpoint".to_string(),
            ));
        }
        Ok(())
    }

    /// Stable tuple identifying this policy for limiter deduplication in the
    /// Factory cache. Two policies with the same fingerprint are
    /// interchangeable for admission purposes.
    pub fn fingerprint(&self) -> PolicyFingerprint {
        PolicyFingerprint {
            capacity: self.capacity,
            window_micros: (self.window * 1_000_000.0).round() as u64,
            algorithm: self.algorithm.as_str().to_string(),
            burst: self.effective_burst(),
            refill_rate_micros: (self.effective_refill_rate() * 1_000_000.0).round() as u64,
            distributed: self.distributed,
        }
    }
}

/// Hashable, `Eq` projection of a [`Policy`] used as the Factory cache key.
/// Floating point fields are quantized to microsecond-scale integers so the
/// fingerprint can derive `Hash`/`Eq` without the usual float pitfalls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyFingerprint {
    capacity: u64,
    window_micros: u64,
    algorithm: String,
    burst: u64,
    refill_rate_micros: u64,
    distributed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_burst_and_refill_rate() {
        let p = Policy::new(10, 60.0, Algorithm::TokenBucket, None, None, false, None).unwrap();
        assert_eq!(p.effective_burst(), 10);
        assert!((p.effective_refill_rate() - 10.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_burst_below_capacity() {
        let err = Policy::new(10, 60.0, Algorithm::TokenBucket, Some(5), None, false, None)
            .unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[test]
    fn rejects_zero_window() {
        let err =
            Policy::new(10, 0.0, Algorithm::SlidingWindow, None, None, false, None).unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[test]
    fn rejects_zero_capacity() {
        let err =
            Policy::new(0, 60.0, Algorithm::FixedWindow, None, None, false, None).unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[test]
    fn distributed_requires_store_endpoint() {
        let err =
            Policy::new(10, 60.0, Algorithm::FixedWindow, None, None, true, None).unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[test]
    fn fingerprints_match_for_equivalent_policies() {
        let a = Policy::new(10, 60.0, Algorithm::TokenBucket, None, None, false, None).unwrap();
        let b = Policy::new(
            10,
            60.0,
            Algorithm::TokenBucket,
            Some(10),
            Some(10.0 / 60.0),
            false,
            None,
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
