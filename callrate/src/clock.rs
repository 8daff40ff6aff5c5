//! Clock and sleep collaborators.
//!
//! The limiter never reads wall-clock time directly. It asks a [`Clock`] for
//! a tick counter and asks a [`Sleeper`] (or [`AsyncSleeper`]) to wait a
//! number of ticks. Tick counters are fixed-width and wrap back to zero after
//! [`Clock::max_ticks`].

use crate::error::{LimiterError, LimiterResult};
use async_trait::async_trait;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Unit of time shared by clocks, sleepers and the limiter period.
pub type Ticks = u64;

/// A monotonic tick counter.
pub trait Clock {
    /// Returns the current reading.
    fn now(&self) -> Ticks;

    /// Largest value the counter reaches before wrapping to zero.
    fn max_ticks(&self) -> Ticks {
        Ticks::MAX
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Ticks {
        (**self).now()
    }

    fn max_ticks(&self) -> Ticks {
        (**self).max_ticks()
    }
}

/// Blocking delay, measured in the same ticks as the clock.
pub trait Sleeper {
    /// Block the calling thread for `ticks`.
    fn sleep(&self, ticks: Ticks);
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, ticks: Ticks) {
        (**self).sleep(ticks)
    }
}

/// Non-blocking delay for use from async code.
///
/// Futures returned by this trait are not required to be `Send`; a limiter
/// belongs to a single task.
#[async_trait(?Send)]
pub trait AsyncSleeper {
    /// Suspend the current task for `ticks`.
    async fn sleep_async(&self, ticks: Ticks);
}

#[async_trait(?Send)]
impl<T: AsyncSleeper + ?Sized> AsyncSleeper for &T {
    async fn sleep_async(&self, ticks: Ticks) {
        (**self).sleep_async(ticks).await
    }
}

/// Ticks elapsed from `last` to `now` on a counter that wraps after `max`.
///
/// A reading smaller than `last` means the counter wrapped; the result is
/// then the distance modulo `max + 1`.
pub fn elapsed_between(last: Ticks, now: Ticks, max: Ticks) -> Ticks {
    if now >= last {
        now - last
    } else {
        max.saturating_sub(last) + now + 1
    }
}

/// Move `instant` forward by `by` ticks on a counter that wraps after `max`.
pub fn advance_wrapping(instant: Ticks, by: Ticks, max: Ticks) -> Ticks {
    let by = match max.checked_add(1) {
        Some(modulus) => by % modulus,
        None => by,
    };
    let headroom = max.saturating_sub(instant);
    if by > headroom {
        by - headroom - 1
    } else {
        instant + by
    }
}

/// Clock backed by [`Instant`], counting whole units of `resolution` since
/// construction.
///
/// Sleeps with [`std::thread::sleep`] when used as a [`Sleeper`] and with
/// [`tokio::time::sleep`] when used as an [`AsyncSleeper`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
    resolution: Duration,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            resolution: Duration::from_millis(1),
        }
    }
}

impl MonotonicClock {
    /// Create a clock with millisecond ticks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock with a custom tick length.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidResolution`] if `resolution` is zero.
    pub fn with_resolution(resolution: Duration) -> LimiterResult<Self> {
        if resolution.is_zero() {
            return Err(LimiterError::InvalidResolution);
        }
        Ok(Self {
            origin: Instant::now(),
            resolution,
        })
    }

    /// Length of one tick.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Convert ticks to wall time, saturating at `Duration::MAX`.
    pub fn ticks_to_duration(&self, ticks: Ticks) -> Duration {
        let nanos = self.resolution.as_nanos().saturating_mul(u128::from(ticks));
        match u64::try_from(nanos / 1_000_000_000) {
            Ok(secs) => Duration::new(secs, (nanos % 1_000_000_000) as u32),
            Err(_) => Duration::MAX,
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Ticks {
        // Truncation wraps the counter at u64::MAX, matching max_ticks.
        (self.origin.elapsed().as_nanos() / self.resolution.as_nanos()) as Ticks
    }
}

impl Sleeper for MonotonicClock {
    fn sleep(&self, ticks: Ticks) {
        if ticks > 0 {
            std::thread::sleep(self.ticks_to_duration(ticks));
        }
    }
}

#[async_trait(?Send)]
impl AsyncSleeper for MonotonicClock {
    async fn sleep_async(&self, ticks: Ticks) {
        if ticks > 0 {
            tokio::time::sleep(self.ticks_to_duration(ticks)).await;
        }
    }
}

/// Clock that only moves when told to.
///
/// Sleeping on a `ManualClock` advances it by the requested ticks, so a
/// limiter driven by `&ManualClock` runs instantly and deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Ticks>,
    max: Ticks,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Cell::new(0),
            max: Ticks::MAX,
        }
    }
}

impl ManualClock {
    /// Create a clock reading zero on a full-width counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock whose counter wraps to zero after `max`.
    pub fn wrapping_at(max: Ticks) -> Self {
        Self {
            now: Cell::new(0),
            max,
        }
    }

    /// Start the clock at `ticks`, clamped to the counter's maximum.
    #[must_use]
    pub fn starting_at(self, ticks: Ticks) -> Self {
        self.now.set(ticks.min(self.max));
        self
    }

    /// Move the clock forward, wrapping past the maximum.
    pub fn advance(&self, ticks: Ticks) {
        self.now.set(advance_wrapping(self.now.get(), ticks, self.max));
    }

    /// Set the reading directly.
    pub fn set(&self, ticks: Ticks) {
        self.now.set(ticks.min(self.max));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        self.now.get()
    }

    fn max_ticks(&self) -> Ticks {
        self.max
    }
}

impl Sleeper for ManualClock {
    fn sleep(&self, ticks: Ticks) {
        self.advance(ticks);
    }
}

#[async_trait(?Send)]
impl AsyncSleeper for ManualClock {
    async fn sleep_async(&self, ticks: Ticks) {
        self.advance(ticks);
    }
}
