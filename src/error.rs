use std::fmt;

#[derive(Debug)]
pub enum RateLimitError {
    /// Invalid policy: non-positive capacity/window, unknown algorithm tag,
    /// or `burst < capacity`. Raised at construction, never from `decide`.
    Config(String),
    /// Shared store unavailable or script execution failed. Handled
    /// internally by fail-open admission — callers normally never see this
    /// variant surface past the distributed limiter.
    Store(String),
    /// `decide`/`reset`/`inspect` called with an empty client identifier.
    ClientId(String),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::Config(msg) => write!(f, "invalid rate limit policy: {}", msg),
            RateLimitError::Store(msg) => write!(f, "rate limit store error: {}", msg),
            RateLimitError::ClientId(msg) => write!(f, "invalid client id: {}", msg),
        }
    }
}

impl std::error::Error for RateLimitError {}
