//! Rate limiting engine: token bucket, sliding window, leaky bucket and
//! fixed window admission control, with an optional Redis-backed
//! distributed variant for multi-instance deployments.
//!
//! [`factory::Factory`] is the typical entry point — it turns a
//! [`policy::Policy`] into a cached, ready-to-use [`limiter::Limiter`].
//! [`http_adapter::evaluate`] frames a single admission check as HTTP
//! status/headers for callers embedding this in a request pipeline.

pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod factory;
pub mod http_adapter;
pub mod limiter;
pub mod metrics;
pub mod policy;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use decision::{Decision, Status};
pub use error::RateLimitError;
pub use factory::Factory;
pub use limiter::Limiter;
pub use policy::{Algorithm, Policy};
