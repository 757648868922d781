/// Result of a single admission check. Immutable — every `decide()` call
/// produces a fresh value rather than mutating a shared response object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub admitted: bool,
    /// Remaining capacity in [0, capacity] (or [0, burst] for TokenBucket).
    pub remaining: u64,
    /// Absolute epoch-ish seconds (same timeline as the injected `Clock`)
    /// at which the limiter returns to full capacity.
    pub reset_at: f64,
    /// Seconds until the next admission is possible. Present iff `!admitted`.
    pub retry_after: Option<u64>,
    /// Count of admitted requests attributed to the current window.
    pub in_window: u64,
}

impl Decision {
    pub fn admit(remaining: u64, reset_at: f64, in_window: u64) -> Self {
        Decision {
            admitted: true,
            remaining,
            reset_at,
            retry_after: None,
            in_window,
        }
    }

    pub fn reject(reset_at: f64, retry_after: u64, in_window: u64) -> Self {
        Decision {
            admitted: false,
            remaining: 0,
            reset_at,
            retry_after: Some(retry_after),
            in_window,
        }
    }
}

/// Status record returned by `Limiter::inspect` — a read-only snapshot,
/// does not mutate per-client state or consume capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub algorithm: &'static str,
    pub in_window: u64,
    pub capacity: u64,
    pub reset_at: f64,
}
