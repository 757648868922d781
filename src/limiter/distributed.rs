use std::sync::Arc;

use crate::clock::Clock;
use crate::decision::{Decision, Status};
use crate::policy::Policy;
use crate::store::Store;

/// Distributed limiter — delegates state to a shared [`Store`] (§4.5).
///
/// On store failure the engine fails open: logs at error level and admits
/// the request, trading strict enforcement for availability during a
/// backend outage (§7). This is the only limiter variant that can ever
/// observe an error from its backing state, and the only place that error
/// is swallowed rather than surfaced — by design.
pub struct DistributedLimiter {
    clock: Arc<dyn Clock>,
    capacity: u64,
    window: f64,
    store: Arc<dyn Store>,
}

impl DistributedLimiter {
    pub fn new(policy: &Policy, clock: Arc<dyn Clock>, store: Arc<dyn Store>) -> Self {
        Self {
            clock,
            capacity: policy.capacity,
            window: policy.window,
            store,
        }
    }

    pub async fn decide(&self, client_id: &str) -> Decision {
        let now = self.clock.now();
        let now_ms = (now * 1000.0).round() as i64;
        let window_ms = (self.window * 1000.0).round() as i64;

        match self.store.check(client_id, now_ms, window_ms, self.capacity).await {
            Ok(check) if check.admitted => {
                Decision::admit(check.remaining, now + self.window, check.in_window)
            }
            Ok(check) => {
                let retry_after = (self.window / check.in_window.max(1) as f64).ceil().max(1.0) as u64;
                Decision::reject(now + self.window, retry_after, check.in_window)
            }
            Err(err) => {
                tracing::error!(
                    client_id,
                    error = %err,
                    "distributed rate limiter store error, failing open"
                );
                metrics::counter!("ratelimit_engine_store_errors_total").increment(1);
                Decision::admit(self.capacity.saturating_sub(1), now + self.window, self.capacity)
            }
        }
    }

    pub async fn reset(&self, client_id: &str) {
        if let Err(err) = self.store.reset(client_id).await {
            tracing::error!(client_id, error = %err, "failed to reset distributed rate limit key");
        }
    }

    pub async fn inspect(&self, client_id: &str) -> Status {
        let now = self.clock.now();
        match self.store.inspect(client_id).await {
            Ok(status) => Status {
                algorithm: "distributed",
                in_window: status.in_window,
                capacity: self.capacity,
                reset_at: now + self.window,
            },
            Err(err) => {
                tracing::error!(client_id, error = %err, "failed to inspect distributed rate limit key");
                Status {
                    algorithm: "distributed",
                    in_window: 0,
                    capacity: self.capacity,
                    reset_at: now + self.window,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::policy::Algorithm;
    use crate::store::fakes::{AlwaysErrorsStore, FakeStore};

    fn policy() -> Policy {
        Policy::new(
            10,
            60.0,
            Algorithm::FixedWindow,
            None,
            None,
            true,
            Some("redis://unreachable:6379".to_string()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn admits_and_decrements_remaining() {
        let limiter = DistributedLimiter::new(
            &policy(),
            Arc::new(MockClock::new()),
            Arc::new(FakeStore::default()),
        );
        let d = limiter.decide("c").await;
        assert!(d.admitted);
        assert_eq!(d.remaining, 9);
    }

    #[tokio::test]
    async fn rejects_past_capacity() {
        let limiter = DistributedLimiter::new(
            &Policy::new(
                2,
                60.0,
                Algorithm::FixedWindow,
                None,
                None,
                true,
                Some("redis://unreachable:6379".to_string()),
            )
            .unwrap(),
            Arc::new(MockClock::new()),
            Arc::new(FakeStore::default()),
        );
        assert!(limiter.decide("c").await.admitted);
        assert!(limiter.decide("c").await.admitted);
        let d = limiter.decide("c").await;
        assert!(!d.admitted);
        assert!(d.retry_after.is_some());
    }

    #[tokio::test]
    async fn e6_distributed_fail_open() {
        let limiter = DistributedLimiter::new(
            &policy(),
            Arc::new(MockClock::new()),
            Arc::new(AlwaysErrorsStore),
        );
        let d = limiter.decide("c6").await;
        assert!(d.admitted);
        assert_eq!(d.remaining, 9);
    }
}
