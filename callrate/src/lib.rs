//! # callrate
//!
//! Token-bucket call-rate limiting for a single caller.
//!
//! A [`TokenBucketLimiter`] admits at most `capacity` calls per `period`
//! ticks. Once the initial burst is spent, admissions are spaced evenly
//! rather than bursted-then-blocked.
//!
//! ## Core Concepts
//!
//! - **[`RateLimitConfig`]**: The quota (period and capacity)
//! - **[`TokenBucketLimiter`]**: Admits or defers calls against the quota
//! - **[`Clock`]**: Wrapping tick counter the limiter reads
//! - **[`Sleeper`]** / **[`AsyncSleeper`]**: How the limiter waits
//!
//! ## Admission Policies
//!
//! - [`TokenBucketLimiter::call_or_drop`]: Run now or drop, never waits
//! - [`TokenBucketLimiter::call`]: Block the thread until admitted
//! - [`TokenBucketLimiter::call_async`]: Await admission, cancellable
//!
//! ## Example
//!
//! ```ignore
//! use callrate::{RateLimitConfig, TokenBucketLimiter};
//!
//! let mut limiter = TokenBucketLimiter::monotonic(RateLimitConfig::per_second(10))?;
//! limiter.set_dropped_call_callback(|dropped| {
//!     tracing::warn!(dropped, "calls dropped");
//! });
//!
//! for reading in readings {
//!     limiter.call_or_drop(|| publish(reading));
//! }
//! ```
//!
//! ## Testing With a Manual Clock
//!
//! ```ignore
//! use callrate::{ManualClock, RateLimitConfig, TokenBucketLimiter};
//!
//! let clock = ManualClock::new();
//! let mut limiter = TokenBucketLimiter::with_clock(RateLimitConfig::new(1_000, 5), &clock)?;
//!
//! // Sleeping on a manual clock advances it, so this returns immediately.
//! let at = limiter.call(|| clock.now());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;

// Re-exports
pub use clock::{
    advance_wrapping, elapsed_between, AsyncSleeper, Clock, ManualClock, MonotonicClock, Sleeper,
    Ticks,
};
pub use config::RateLimitConfig;
pub use error::{LimiterError, LimiterResult};
pub use limiter::TokenBucketLimiter;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Clock, LimiterError, LimiterResult, MonotonicClock, RateLimitConfig, Sleeper, Ticks,
        TokenBucketLimiter,
    };
}
