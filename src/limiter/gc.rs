//! Shared idle-eviction sweep for the local limiter variants.
//!
//! Ground: `proxy/filter/rate_limit.rs`'s `RateLimiter::evict_stale` /
//! `force_evict_buckets` in the teacher gateway. Each local variant's
//! per-client record tracks its own `last_access` timestamp; this module
//! provides the generic retain-then-force-evict sweep so the four limiter
//! variants don't each reimplement it.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Entries not accessed for this many seconds are eligible for eviction.
pub const GC_EXPIRE_SECS: u64 = 300;
/// GC runs every this many seconds.
pub const GC_INTERVAL_SECS: u64 = 60;
/// Hard cap on entries per map. When exceeded, the oldest entries beyond
/// this limit are force-evicted regardless of last-access time.
pub const MAX_ENTRIES: usize = 100_000;

pub fn now_us() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Any per-client record that can report when it was last touched.
pub trait LastAccess {
    fn last_access(&self) -> &AtomicU64;
}

/// Remove entries idle for longer than `GC_EXPIRE_SECS`, then — if the map
/// is still over `MAX_ENTRIES` — force-evict the oldest entries until it
/// isn't.
pub fn evict_stale<V: LastAccess>(map: &DashMap<String, Arc<V>>) {
    let now = now_us();
    let expire_us = GC_EXPIRE_SECS * 1_000_000;

    map.retain(|_, v| now.saturating_sub(v.last_access().load(Ordering::Relaxed)) < expire_us);

    let overflow = map.len().saturating_sub(MAX_ENTRIES);
    if overflow == 0 {
        return;
    }
    let mut entries: Vec<(String, u64)> = map
        .iter()
        .map(|r| {
            let age = now.saturating_sub(r.value().last_access().load(Ordering::Relaxed));
            (r.key().clone(), age)
        })
        .collect();
    entries.sort_unstable_by(|a, b| b.1.cmp(&a.1));
    for (key, _) in entries.into_iter().take(overflow) {
        map.remove(&key);
    }
}
