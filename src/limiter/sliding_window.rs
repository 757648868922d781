use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gc::{evict_stale, now_us, LastAccess};
use crate::clock::Clock;
use crate::decision::{Decision, Status};
use crate::policy::Policy;

/// Sliding window log — exact admission count over a rolling window via a
/// FIFO timestamp log, as opposed to the teacher gateway's blended
/// previous/current-window approximation. The spec calls for an exact
/// count (§4.2), so this keeps the full log rather than the teacher's
/// two-counter estimate.
pub struct SlidingWindowLimiter {
    clock: Arc<dyn Clock>,
    capacity: u64,
    window: f64,
    logs: DashMap<String, Arc<Log>>,
}

struct Log {
    inner: Mutex<VecDeque<f64>>,
    last_access: AtomicU64,
}

impl LastAccess for Log {
    fn last_access(&self) -> &AtomicU64 {
        &self.last_access
    }
}

impl SlidingWindowLimiter {
    pub fn new(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity: policy.capacity,
            window: policy.window,
            logs: DashMap::new(),
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
                evict_stale(&this.logs);
            }
        });
    }

    fn get_or_create(&self, client_id: &str) -> Arc<Log> {
        if let Some(entry) = self.logs.get(client_id) {
            return entry.value().clone();
        }
        self.logs
            .entry(client_id.to_string())
            .or_insert_with(|| {
                Arc::new(Log {
                    inner: Mutex::new(VecDeque::new()),
                    last_access: AtomicU64::new(now_us()),
                })
            })
            .clone()
    }

    pub async fn decide(&self, client_id: &str) -> Decision {
        let now = self.clock.now();
        let log = self.get_or_create(client_id);
        log.last_access.store(now_us(), Ordering::Relaxed);

        let cutoff = now - self.window;
        let mut timestamps = log.inner.lock().await;
        while matches!(timestamps.front(), Some(&front) if front <= cutoff) {
            timestamps.pop_front();
        }

        let n = timestamps.len() as u64;
        if n < self.capacity {
            timestamps.push_back(now);
            let reset_at = timestamps
                .front()
                .copied()
                .map(|t| t + self.window)
                .unwrap_or(now + self.window);
            Decision::admit(self.capacity - n - 1, reset_at, n + 1)
        } else {
            let oldest = *timestamps.front().expect("n == capacity > 0 implies non-empty");
            let retry_after = ((oldest + self.window - now).ceil() as i64).max(1) as u64;
            Decision::reject(oldest + self.window, retry_after, n)
        }
    }

    pub async fn reset(&self, client_id: &str) {
        self.logs.insert(
            client_id.to_string(),
            Arc::new(Log {
                inner: Mutex::new(VecDeque::new()),
                last_access: AtomicU64::new(now_us()),
            }),
        );
    }

    pub async fn inspect(&self, client_id: &str) -> Status {
        let now = self.clock.now();
        let log = self.get_or_create(client_id);
        let cutoff = now - self.window;
        let mut timestamps = log.inner.lock().await;
        while matches!(timestamps.front(), Some(&front) if front <= cutoff) {
            timestamps.pop_front();
        }
        let n = timestamps.len() as u64;
        let reset_at = timestamps
            .front()
            .copied()
            .map(|t| t + self.window)
            .unwrap_or(now + self.window);
        Status {
            algorithm: "sliding_window",
            in_window: n,
            capacity: self.capacity,
            reset_at,
        }
    }
}
