//! Limiter error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while configuring a limiter.
///
/// Admission itself never fails: a dropped call is reported through the
/// boolean returned by `call_or_drop`, not through this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The period was zero ticks.
    #[error("Rate limit period must be at least one tick")]
    ZeroPeriod,

    /// The capacity was zero calls.
    #[error("Rate limit capacity must be at least one call per period")]
    ZeroCapacity,

    /// A period given as a `Duration` does not fit in the tick counter.
    #[error("Period {period:?} does not fit in the tick counter")]
    PeriodOutOfRange {
        /// Requested period.
        period: Duration,
    },

    /// Earning one token takes longer than the clock can measure before it
    /// wraps, so no token would ever be credited.
    #[error("One token takes up to {ticks_per_token} ticks but the clock wraps after {max_ticks}")]
    PeriodExceedsClock {
        /// Worst-case ticks needed to earn one token.
        ticks_per_token: u64,
        /// Largest reading of the clock.
        max_ticks: u64,
    },

    /// A clock resolution of zero was requested.
    #[error("Tick resolution must be non-zero")]
    InvalidResolution,
}

impl LimiterError {
    /// Check if this error came from the period/capacity pair itself.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ZeroPeriod | Self::ZeroCapacity)
    }
}

/// Result type for limiter construction.
pub type LimiterResult<T> = Result<T, LimiterError>;
