use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gc::{evict_stale, now_us, LastAccess};
use crate::clock::Clock;
use crate::decision::{Decision, Status};
use crate::policy::Policy;

/// Leaky bucket — FIFO queue of admission timestamps, drained at
/// `leak_rate = capacity / window` requests/sec.
///
/// `last_leak` only advances when at least one item actually leaked (§4.3,
/// "accumulating" variant) so that sub-tick elapsed time is never
/// discarded — at low leak rates, resetting `last_leak` on every call
/// without having leaked anything would silently slow the effective rate
/// below what the policy configured.
pub struct LeakyBucketLimiter {
    clock: Arc<dyn Clock>,
    capacity: u64,
    window: f64,
    leak_rate: f64,
    buckets: DashMap<String, Arc<Bucket>>,
}

struct Bucket {
    inner: Mutex<BucketInner>,
    last_access: AtomicU64,
}

struct BucketInner {
    queue: VecDeque<f64>,
    last_leak: f64,
    total_leaked: u64,
}

impl LastAccess for Bucket {
    fn last_access(&self) -> &AtomicU64 {
        &self.last_access
    }
}

impl LeakyBucketLimiter {
    pub fn new(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity: policy.capacity,
            window: policy.window,
            leak_rate: policy.leak_rate(),
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
                        queue: VecDeque::new(),
                        last_leak: now,
                        total_leaked: 0,
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
        let elapsed = now - inner.last_leak;
        let to_leak = (elapsed * self.leak_rate).floor().max(0.0) as u64;
        let mut leaked = 0u64;
        for _ in 0..to_leak {
            if inner.queue.pop_front().is_some() {
                leaked += 1;
            } else {
                break;
            }
        }
        if leaked > 0 {
            inner.total_leaked += leaked;
            inner.last_leak = now;
        }

        if (inner.queue.len() as u64) < self.capacity {
            inner.queue.push_back(now);
            let in_window = inner.queue.len() as u64;
            let remaining = self.capacity.saturating_sub(in_window);
            Decision::admit(remaining, now + self.window, in_window)
        } else {
            let retry_after = (1.0 / self.leak_rate).ceil().max(1.0) as u64;
            Decision::reject(now + retry_after as f64, retry_after, inner.queue.len() as u64)
        }
    }

    pub async fn reset(&self, client_id: &str) {
        let now = self.clock.now();
        self.buckets.insert(
            client_id.to_string(),
            Arc::new(Bucket {
                inner: Mutex::new(BucketInner {
                    queue: VecDeque::new(),
                    last_leak: now,
                    total_leaked: 0,
                }),
                last_access: AtomicU64::new(now_us()),
            }),
        );
    }

    pub async fn inspect(&self, client_id: &str) -> Status {
        let now = self.clock.now();
        let bucket = self.get_or_create(client_id, now);
        let inner = bucket.inner.lock().await;
        Status {
            algorithm: "leaky_bucket",
            in_window: inner.queue.len() as u64,
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

    fn limiter(capacity: u64, window: f64, clock: Arc<MockClock>) -> LeakyBucketLimiter {
        let policy =
            Policy::new(capacity, window, Algorithm::LeakyBucket, None, None, false, None)
                .unwrap();
        LeakyBucketLimiter::new(&policy, clock)
    }

    #[tokio::test]
    async fn e3_leaky_bucket_burst_smoothing() {
        let clock = Arc::new(MockClock::new());
        let limiter = limiter(5, 10.0, clock.clone());

        let mut admitted = 0;
        let mut rejected = 0;
        for _ in 0..7 {
            if limiter.decide("c3").await.admitted {
                admitted += 1;
            } else {
                rejected += 1;
            }
        }
        assert_eq!(admitted, 5);
        assert_eq!(rejected, 2);

        clock.advance(2.0);
        assert!(limiter.decide("c3").await.admitted);
    }

    #[tokio::test]
    async fn steady_state_rate_converges() {
        let clock = Arc::new(MockClock::new());
        let limiter = limiter(10, 10.0, clock.clone());
        // leak_rate = 1/sec. Issue one request every second for 50 seconds;
        // queue should never exceed capacity and every request is admitted.
        for _ in 0..50 {
            let d = limiter.decide("steady").await;
            assert!(d.admitted);
            clock.advance(1.0);
        }
    }

    #[tokio::test]
    async fn reset_clears_queue() {
        let clock = Arc::new(MockClock::new());
        let limiter = limiter(3, 10.0, clock);
        for _ in 0..3 {
            limiter.decide("c").await;
        }
        assert!(!limiter.decide("c").await.admitted);
        limiter.reset("c").await;
        assert!(limiter.decide("c").await.admitted);
    }
}
