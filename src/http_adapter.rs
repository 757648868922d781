//! Pure HTTP framing for a rate limit [`Decision`] (§5, §6.2).
//!
//! Grounded on the teacher's `filter::rate_limit::rate_limit_on_request`:
//! same shape (check, then either continue or produce a rejection
//! response, with a counter bump on each branch) but reduced to a pure
//! function returning headers, a status code, and (on rejection) a typed
//! JSON body instead of reaching into a `RequestContext` and building a
//! `hyper::Response` — wiring this into an actual server is left to the
//! embedding application (§1 Non-goals).

use std::time::{Duration, SystemTime};

use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::decision::Decision;
use crate::error::RateLimitError;
use crate::limiter::Limiter;

/// JSON rejection body from §6.2. `reset_at` is formatted the same way the
/// teacher stamps timestamps in `server/instance_registry.rs` —
/// `humantime::format_rfc3339_seconds(SystemTime::now())` — applied to an
/// estimated wall-clock instant `retry_after` seconds out, since the
/// engine's own `Clock` is monotonic and carries no wall-clock epoch.
#[derive(Debug, Clone, Serialize)]
pub struct RejectionBody {
    pub error: &'static str,
    pub message: String,
    pub retry_after: u64,
    pub reset_at: String,
}

/// Standard rate-limit response headers plus the status an HTTP layer
/// should send, derived from a single [`Decision`]. `body` is populated
/// only on rejection, per §6.2.
#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub decision: Decision,
    pub body: Option<RejectionBody>,
}

impl AdapterOutcome {
    fn from_decision(decision: Decision, capacity: u64, window: f64) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", header_value(capacity));
        headers.insert("x-ratelimit-remaining", header_value(decision.remaining));
        headers.insert(
            "x-ratelimit-reset",
            header_value(decision.reset_at.round().max(0.0) as u64),
        );

        let (status, body) = if decision.admitted {
            (StatusCode::OK, None)
        } else {
            let retry_after = decision.retry_after.unwrap_or(0);
            headers.insert("retry-after", header_value(retry_after));

            let reset_at_wall = SystemTime::now() + Duration::from_secs(retry_after);
            let body = RejectionBody {
                error: "Rate limit exceeded",
                message: format!("Maximum {capacity} requests per {window}s allowed"),
                retry_after,
                reset_at: humantime::format_rfc3339_seconds(reset_at_wall).to_string(),
            };
            (StatusCode::TOO_MANY_REQUESTS, Some(body))
        };

        AdapterOutcome {
            status,
            headers,
            decision,
            body,
        }
    }
}

fn header_value(n: u64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).expect("integer formats to a valid header value")
}

/// Run one admission check and frame it as an HTTP outcome. This is the
/// function a middleware/handler calls per request; everything upstream
/// of it (extracting `client_id` from a request, wiring in the chosen
/// `Limiter`) is the embedding application's job. `capacity`/`window` are
/// the policy's own values, passed in so the rejection body's `message`
/// can be built without the adapter needing to hold a `Policy` itself.
pub async fn evaluate(
    limiter: &Limiter,
    client_id: &str,
    capacity: u64,
    window: f64,
) -> Result<AdapterOutcome, RateLimitError> {
    let decision = limiter.decide(client_id).await?;

    if decision.admitted {
        tracing::debug!(client_id, remaining = decision.remaining, "rate limit: admitted");
        metrics::counter!("ratelimit_engine_allowed_total", "client_id" => client_id.to_string())
            .increment(1);
    } else {
        tracing::debug!(client_id, retry_after = decision.retry_after, "rate limit: rejected");
        metrics::counter!("ratelimit_engine_rejected_total", "client_id" => client_id.to_string())
            .increment(1);
    }

    Ok(AdapterOutcome::from_decision(decision, capacity, window))
}
