//! Token-bucket limiter for function calls.

use crate::clock::{
    advance_wrapping, elapsed_between, AsyncSleeper, Clock, MonotonicClock, Sleeper, Ticks,
};
use crate::config::RateLimitConfig;
use crate::error::{LimiterError, LimiterResult};
use std::fmt;
use tracing::{debug, trace};

type DroppedCallCallback = Box<dyn FnMut(u64)>;

/// Admits at most `capacity` calls per `period` ticks, spacing them evenly
/// once the initial burst is spent.
///
/// Two admission policies are offered:
///
/// - [`call_or_drop`](Self::call_or_drop) runs the work if a token is
///   available and otherwise drops it.
/// - [`call`](Self::call) and [`call_async`](Self::call_async) wait until a
///   token is earned and never drop.
///
/// Token accrual is exact integer arithmetic. The refill instant only moves
/// forward by the time actually spent earning whole tokens, so partial
/// progress toward the next token is never lost and the long-run rate is
/// exactly `capacity / period`.
///
/// A limiter belongs to one caller; every operation takes `&mut self`.
///
/// # Example
///
/// ```ignore
/// use callrate::{RateLimitConfig, TokenBucketLimiter};
///
/// let mut limiter = TokenBucketLimiter::monotonic(RateLimitConfig::per_second(5))?;
/// limiter.set_dropped_call_callback(|n| eprintln!("dropped {n} calls"));
///
/// if !limiter.call_or_drop(|| poll_sensor()) {
///     // over quota, try later
/// }
/// let reading = limiter.call(|| read_sensor());
/// ```
pub struct TokenBucketLimiter<C, S> {
    config: RateLimitConfig,
    tokens: u64,
    last_refill: Ticks,
    /// Sub-tick part of `last_refill`, in units of `1 / capacity` ticks.
    residual: u64,
    dropped: u64,
    on_dropped: Option<DroppedCallCallback>,
    clock: C,
    sleeper: S,
}

impl<C, S> fmt::Debug for TokenBucketLimiter<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("last_refill", &self.last_refill)
            .field("dropped", &self.dropped)
            .field("has_callback", &self.on_dropped.is_some())
            .finish()
    }
}

impl TokenBucketLimiter<MonotonicClock, MonotonicClock> {
    /// Create a limiter on a millisecond [`MonotonicClock`].
    pub fn monotonic(config: RateLimitConfig) -> LimiterResult<Self> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock + Sleeper + Clone> TokenBucketLimiter<C, C> {
    /// Create a limiter whose clock also does the sleeping.
    pub fn with_clock(config: RateLimitConfig, clock: C) -> LimiterResult<Self> {
        Self::new(config, clock.clone(), clock)
    }
}

impl<C: Clock, S> TokenBucketLimiter<C, S> {
    /// Create a full bucket.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::ZeroPeriod`] or [`LimiterError::ZeroCapacity`]
    /// if the config is empty, and [`LimiterError::PeriodExceedsClock`] if a
    /// single token takes longer to earn than the clock can count before
    /// wrapping.
    pub fn new(config: RateLimitConfig, clock: C, sleeper: S) -> LimiterResult<Self> {
        config.validate()?;
        let ticks_per_token = config.max_ticks_per_token();
        let max_ticks = clock.max_ticks();
        if ticks_per_token > max_ticks {
            return Err(LimiterError::PeriodExceedsClock {
                ticks_per_token,
                max_ticks,
            });
        }
        let now = clock.now();
        Ok(Self {
            config,
            tokens: config.capacity,
            last_refill: now,
            residual: 0,
            dropped: 0,
            on_dropped: None,
            clock,
            sleeper,
        })
    }

    /// The quota this limiter enforces.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Window length in ticks.
    pub fn period(&self) -> Ticks {
        self.config.period
    }

    /// Calls admitted per window.
    pub fn capacity(&self) -> u64 {
        self.config.capacity
    }

    /// Calls dropped and not yet reported to the callback.
    pub fn pending_drops(&self) -> u64 {
        self.dropped
    }

    /// Register a handler for dropped calls, replacing any previous one.
    ///
    /// The handler receives the number of calls dropped since it last ran,
    /// right before the next admitted call executes.
    pub fn set_dropped_call_callback<F>(&mut self, callback: F)
    where
        F: FnMut(u64) + 'static,
    {
        self.on_dropped = Some(Box::new(callback));
    }

    /// Remove the dropped-call handler. Drops are still counted.
    pub fn clear_dropped_call_callback(&mut self) {
        self.on_dropped = None;
    }

    /// Tokens available right now.
    pub fn available_tokens(&mut self) -> u64 {
        self.refill();
        self.tokens
    }

    /// Ticks until a call would be admitted; zero if one would be now.
    pub fn time_until_available(&mut self) -> Ticks {
        self.refill();
        if self.tokens > 0 {
            0
        } else {
            self.estimate_wait()
        }
    }

    /// Run `work` if a token is available, otherwise drop it.
    ///
    /// Returns whether the call was admitted. Never blocks.
    pub fn call_or_drop<F>(&mut self, work: F) -> bool
    where
        F: FnOnce(),
    {
        self.refill();
        if self.tokens > 0 {
            self.admit(work);
            true
        } else {
            self.dropped = self.dropped.saturating_add(1);
            debug!(dropped = self.dropped, "call dropped by rate limiter");
            false
        }
    }

    fn refill(&mut self) {
        let max = self.clock.max_ticks();
        let elapsed = elapsed_between(self.last_refill, self.clock.now(), max);
        let capacity = u128::from(self.config.capacity);
        let period = u128::from(self.config.period);

        let earned = (u128::from(elapsed) * capacity).saturating_sub(u128::from(self.residual));
        let new_tokens = earned / period;
        if new_tokens == 0 {
            return;
        }

        // Advance by the time spent on whole tokens only; the rest carries over.
        let spent = new_tokens * period + u128::from(self.residual);
        self.last_refill = advance_wrapping(self.last_refill, (spent / capacity) as Ticks, max);
        self.residual = (spent % capacity) as u64;

        let before = self.tokens;
        self.tokens = (u128::from(before) + new_tokens).min(capacity) as u64;
        trace!(
            credited = self.tokens - before,
            tokens = self.tokens,
            "refilled token bucket"
        );
    }

    fn estimate_wait(&self) -> Ticks {
        let time_per_token = self.config.ticks_per_token(self.residual);
        let elapsed = elapsed_between(self.last_refill, self.clock.now(), self.clock.max_ticks());
        // The clock may have moved past the estimate already.
        time_per_token.saturating_sub(elapsed)
    }

    fn admit<F, T>(&mut self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.report_drops();
        let output = work();
        self.tokens -= 1;
        output
    }

    fn report_drops(&mut self) {
        if self.dropped == 0 {
            return;
        }
        if let Some(callback) = self.on_dropped.as_mut() {
            debug!(dropped = self.dropped, "reporting dropped calls");
            callback(self.dropped);
            self.dropped = 0;
        }
    }
}

impl<C: Clock, S: Sleeper> TokenBucketLimiter<C, S> {
    /// Run `work` once a token is available, blocking the thread until then.
    ///
    /// Never drops. The wait is re-estimated after every sleep, so an early
    /// or late wake-up only costs another loop.
    pub fn call<F, T>(&mut self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.refill();
        while self.tokens == 0 {
            let wait = self.estimate_wait();
            debug!(wait_ticks = wait, "waiting for rate limiter token");
            self.sleeper.sleep(wait);
            self.refill();
        }
        self.admit(work)
    }
}

impl<C: Clock, S: AsyncSleeper> TokenBucketLimiter<C, S> {
    /// Async form of [`call`](Self::call).
    ///
    /// Dropping the returned future while it waits cancels the call without
    /// consuming a token.
    pub async fn call_async<F, T>(&mut self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.refill();
        while self.tokens == 0 {
            let wait = self.estimate_wait();
            debug!(wait_ticks = wait, "waiting for rate limiter token");
            self.sleeper.sleep_async(wait).await;
            self.refill();
        }
        self.admit(work)
    }
}
