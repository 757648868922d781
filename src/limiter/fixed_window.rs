use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gc::{evict_stale, now_us, LastAccess};
use crate::clock::Clock;
use crate::decision::{Decision, Status};
use crate::policy::Policy;

/// Fixed window counter.
///
/// Windows are aligned to absolute multiples of `window` measured from the
/// clock's origin (`window_start = floor(now / window) * window`), not to
/// the time of each client's first request. This is what makes the
/// documented boundary-burst weakness reproducible: two clients (or the
/// same client) hitting the gateway right before and right after an
/// absolute boundary both see a fresh window, independent of when either
/// of them first showed up.
pub struct FixedWindowLimiter {
    clock: Arc<dyn Clock>,
    capacity: u64,
    window: f64,
    windows: DashMap<String, Arc<Window>>,
}

struct Window {
    inner: Mutex<WindowInner>,
    last_access: AtomicU64,
}

struct WindowInner {
    count: u64,
    window_start: f64,
}

impl LastAccess for Window {
    fn last_access(&self) -> &AtomicU64 {
        &self.last_access
    }
}

fn aligned_window_start(now: f64, window: f64) -> f64 {
    (now / window).floor() * window
}

impl FixedWindowLimiter {
    pub fn new(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity: policy.capacity,
            window: policy.window,
            windows: DashMap::new(),
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
                evict_stale(&this.windows);
            }
        });
    }

    fn get_or_create(&self, client_id: &str, now: f64) -> Arc<Window> {
        if let Some(entry) = self.windows.get(client_id) {
            return entry.value().clone();
        }
        self.windows
            .entry(client_id.to_string())
            .or_insert_with(|| {
                Arc::new(Window {
                    inner: Mutex::new(WindowInner {
                        count: 0,
                        window_start: aligned_window_start(now, self.window),
                    }),
                    last_access: AtomicU64::new(now_us()),
                })
            })
            .clone()
    }

    pub async fn decide(&self, client_id: &str) -> Decision {
        let now = self.clock.now();
        let window = self.get_or_create(client_id, now);
        window.last_access.store(now_us(), Ordering::Relaxed);

        let mut inner = window.inner.lock().await;
        if now - inner.window_start >= self.window {
            inner.count = 0;
            inner.window_start = aligned_window_start(now, self.window);
        }
        let reset_at = inner.window_start + self.window;

        if inner.count < self.capacity {
            inner.count += 1;
            Decision::admit(self.capacity - inner.count, reset_at, inner.count)
        } else {
            let retry_after = ((reset_at - now).ceil() as i64).max(0) as u64;
            Decision::reject(reset_at, retry_after, inner.count)
        }
    }

    pub async fn reset(&self, client_id: &str) {
        let now = self.clock.now();
        self.windows.insert(
            client_id.to_string(),
            Arc::new(Window {
                inner: Mutex::new(WindowInner {
                    count: 0,
                    window_start: aligned_window_start(now, self.window),
                }),
                last_access: AtomicU64::new(now_us()),
            }),
        );
    }

    pub async fn inspect(&self, client_id: &str) -> Status {
        let now = self.clock.now();
        let window = self.get_or_create(client_id, now);
        let inner = window.inner.lock().await;
        Status {
            algorithm: "fixed_window",
            in_window: inner.count,
            capacity: self.capacity,
            reset_at: inner.window_start + self.window,
        }
    }
}
