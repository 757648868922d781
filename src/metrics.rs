//! Metric descriptions for this crate's counters and histograms (§6.4).
//!
//! Grounded on the teacher's `metrics::registry::Metrics::install`, which
//! calls `describe_counter!`/`describe_histogram!`/`describe_gauge!` once
//! at startup so a scrape endpoint carries HELP/TYPE lines, including its
//! own request-duration histogram bucketed via `LATENCY_BUCKETS`. This
//! crate is a library, not a server, so it doesn't install a recorder or
//! expose a `/metrics` route itself — that's the embedding application's
//! job (pick whatever `metrics`-compatible exporter it already uses).
//! `describe()` only registers names and documentation for the metrics
//! this crate emits, and is safe to call multiple times.

use metrics::{describe_counter, describe_histogram, Unit};

/// Register HELP text for every counter/histogram this crate emits. Call
/// once at application startup, after installing a `metrics` recorder.
pub fn describe() {
    describe_counter!(
        "ratelimit_engine_allowed_total",
        Unit::Count,
        "Total requests admitted by the rate limiter"
    );
    describe_counter!(
        "ratelimit_engine_rejected_total",
        Unit::Count,
        "Total requests rejected by the rate limiter"
    );
    describe_counter!(
        "ratelimit_engine_store_errors_total",
        Unit::Count,
        "Total distributed store failures, all of which fail open"
    );
    describe_histogram!(
        "ratelimit_engine_store_latency_seconds",
        Unit::Seconds,
        "Round-trip latency of the distributed store's check script"
    );
}
