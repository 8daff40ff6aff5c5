//! Limiter configuration.

use crate::clock::Ticks;
use crate::error::{LimiterError, LimiterResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MILLIS_PER_SECOND: Ticks = 1_000;

/// Quota for a limiter: at most `capacity` calls every `period` ticks.
///
/// The presets assume millisecond ticks, which is what
/// [`MonotonicClock::new`](crate::MonotonicClock::new) produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Length of the rolling window, in clock ticks.
    pub period: Ticks,
    /// Calls admitted per window.
    pub capacity: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            period: MILLIS_PER_SECOND,
            capacity: 1,
        }
    }
}

impl RateLimitConfig {
    /// Create a config admitting `capacity` calls every `period` ticks.
    pub fn new(period: Ticks, capacity: u64) -> Self {
        Self { period, capacity }
    }

    /// Set the period.
    pub fn period(mut self, ticks: Ticks) -> Self {
        self.period = ticks;
        self
    }

    /// Set the capacity.
    pub fn capacity(mut self, calls: u64) -> Self {
        self.capacity = calls;
        self
    }

    /// `calls` per second with millisecond ticks.
    pub fn per_second(calls: u64) -> Self {
        Self::new(MILLIS_PER_SECOND, calls)
    }

    /// `calls` per minute with millisecond ticks.
    pub fn per_minute(calls: u64) -> Self {
        Self::new(60 * MILLIS_PER_SECOND, calls)
    }

    /// `calls` per hour with millisecond ticks.
    pub fn per_hour(calls: u64) -> Self {
        Self::new(3_600 * MILLIS_PER_SECOND, calls)
    }

    /// Build a config from a wall-clock period and the clock's tick length.
    ///
    /// The period is truncated to whole ticks.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidResolution`] for a zero tick length and
    /// [`LimiterError::PeriodOutOfRange`] if the period overflows the counter.
    pub fn from_duration(
        period: Duration,
        capacity: u64,
        resolution: Duration,
    ) -> LimiterResult<Self> {
        if resolution.is_zero() {
            return Err(LimiterError::InvalidResolution);
        }
        let ticks = u64::try_from(period.as_nanos() / resolution.as_nanos())
            .map_err(|_| LimiterError::PeriodOutOfRange { period })?;
        Ok(Self::new(ticks, capacity))
    }

    /// Check that both period and capacity are non-zero.
    pub fn validate(&self) -> LimiterResult<()> {
        if self.period == 0 {
            return Err(LimiterError::ZeroPeriod);
        }
        if self.capacity == 0 {
            return Err(LimiterError::ZeroCapacity);
        }
        Ok(())
    }

    /// Ticks needed to earn the next whole token, rounded up.
    ///
    /// `residual` is progress already owed to earlier tokens, in units of
    /// `1 / capacity` ticks, and ranges over `0..capacity`. The config must
    /// have passed [`validate`](Self::validate).
    pub(crate) fn ticks_per_token(&self, residual: u64) -> Ticks {
        let needed = (u128::from(self.period) + u128::from(residual))
            .div_ceil(u128::from(self.capacity));
        u64::try_from(needed).unwrap_or(Ticks::MAX)
    }

    /// Longest time any single token can take to earn.
    ///
    /// A clock must be able to measure this span before it wraps.
    pub(crate) fn max_ticks_per_token(&self) -> Ticks {
        self.ticks_per_token(self.capacity - 1)
    }
}
