use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gc::{evict_stale, now_us, LastAccess};
use crate::clock::Clock;
use crate::decision::{Decision, Status};
use crate::policy::Policy;

/// Token bucket — `tokio::sync::Mutex`-protected per client, not a CAS
/// loop. A CAS-based refill only credits the thread that wins the
/// `last_refill` compare-exchange; every other concurrent caller observes
/// the old `last_refill` and skips its share of the refill, so the
/// effective rate drops under contention. Locking the whole read-refill-
/// consume sequence keeps it linearizable (ground: the documented fix in
/// the teacher gateway's `proxy/filter/rate_limit.rs`).
pub struct TokenBucketLimiter {
    clock: Arc<dyn Clock>,
    capacity: u64,
    burst: u64,
    refill_rate: f64,
    window: f64,
    buckets: DashMap<String, Arc<Bucket>>,
}

struct Bucket {
    inner: Mutex<BucketInner>,
    last_access: AtomicU64,
}

struct BucketInner {
    tokens: f64,
    last_refill: f64,
}

impl LastAccess for Bucket {
    fn last_access(&self) -> &AtomicU64 {
        &self.last_access
    }
}

impl TokenBucketLimiter {
    pub fn new(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity: policy.capacity,
            burst: policy.effective_burst(),
            refill_rate: policy.effective_refill_rate(),
            window: policy.window,
            buckets: DashMap::new(),
        }
    }

    pub fn start_gc(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                super::gc::GC_INTERVAL_SECS,
            ));
            loop {
                interval.tick().await;
                evict_stale(&this.buckets);
            }
        });
    }

    fn get_or_create(&self, client_id: &str, now: f64) -> Arc<Bucket> {
        if let Some(entry) = self.buckets.get(client_id) {
            return entry.value().clone();
        }
        self.buckets
            .entry(client_id.to_string())
            .or_insert_with(|| {
                Arc::new(Bucket {
                    inner: Mutex::new(BucketInner {
                        tokens: self.capacity as f64,
                        last_refill: now,
                    }),
                    last_access: AtomicU64::new(now_us()),
                })
            })
            .clone()
    }

    pub async fn decide(&self, client_id: &str) -> Decision {
        let now = self.clock.now();
        let bucket = self.get_or_create(client_id, now);
        bucket.last_access.store(now_us(), Ordering::Relaxed);

        let mut inner = bucket.inner.lock().await;
        let elapsed = (now - inner.last_refill).max(0.0);
        inner.tokens = (inner.tokens + elapsed * self.refill_rate).min(self.burst as f64);
        inner.last_refill = now;

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            let remaining = inner.tokens.floor() as u64;
            let in_window = self.capacity.saturating_sub(remaining);
            Decision::admit(remaining, now + self.window, in_window)
        } else {
            let retry_after = (1.0 / self.refill_rate).ceil().max(1.0) as u64;
            Decision::reject(now + retry_after as f64, retry_after, self.capacity)
        }
    }

    pub async fn reset(&self, client_id: &str) {
        let now = self.clock.now();
        self.buckets.insert(
            client_id.to_string(),
            Arc::new(Bucket {
                inner: Mutex::new(BucketInner {
                    tokens: self.capacity as f64,
                    last_refill: now,
                }),
                last_access: AtomicU64::new(now_us()),
            }),
        );
    }

    pub async fn inspect(&self, client_id: &str) -> Status {
        let now = self.clock.now();
        let bucket = self.get_or_create(client_id, now);
        let mut inner = bucket.inner.lock().await;
        let elapsed = (now - inner.last_refill).max(0.0);
        inner.tokens = (inner.tokens + elapsed * self.refill_rate).min(self.burst as f64);
        inner.last_refill = now;

        let remaining = inner.tokens.floor() as u64;
        Status {
            algorithm: "token_bucket",
            in_window: self.capacity.saturating_sub(remaining),
            capacity: self.capacity,
            reset_at: now + self.window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::policy::Algorithm;

    fn limiter(capacity: u64, window: f64) -> TokenBucketLimiter {
        let policy = Policy::new(capacity, window, Algorithm::TokenBucket, None, None, false, None)
            .unwrap();
        TokenBucketLimiter::new(&policy, Arc::new(MockClock::new()))
    }

    #[tokio::test]
    async fn e1_token_bucket_basic() {
        let limiter = limiter(10, 60.0);
        let mut remaining_seq = Vec::new();
        let mut admitted = 0;
        for _ in 0..15 {
            let d = limiter.decide("c1").await;
            if d.admitted {
                admitted += 1;
                remaining_seq.push(d.remaining);
            } else {
                assert_eq!(d.retry_after, Some(6));
            }
        }
        assert_eq!(admitted, 10);
        assert_eq!(remaining_seq, vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn refill_after_one_interval_admits_one() {
        let clock = Arc::new(MockClock::new());
        let policy =
            Policy::new(5, 10.0, Algorithm::TokenBucket, None, None, false, None).unwrap();
        let limiter = TokenBucketLimiter::new(&policy, clock.clone());
        for _ in 0..5 {
            assert!(limiter.decide("x").await.admitted);
        }
        assert!(!limiter.decide("x").await.admitted);

        clock.advance(1.0 / limiter.refill_rate);
        assert!(limiter.decide("x").await.admitted);
    }

    #[tokio::test]
    async fn reset_restores_full_capacity() {
        let limiter = limiter(5, 60.0);
        for _ in 0..5 {
            assert!(limiter.decide("c").await.admitted);
        }
        assert!(!limiter.decide("c").await.admitted);
        limiter.reset("c").await;
        let d = limiter.decide("c").await;
        assert!(d.admitted);
        assert_eq!(d.remaining, 4);
    }

    #[tokio::test]
    async fn independent_clients() {
        let limiter = limiter(5, 10.0);
        let mut admitted_a = 0;
        for _ in 0..6 {
            if limiter.decide("A").await.admitted {
                admitted_a += 1;
            }
        }
        assert_eq!(admitted_a, 5);
        let d = limiter.decide("B").await;
        assert!(d.admitted);
        assert_eq!(d.remaining, 4);
    }
}
