//! Continuous-refill token bucket.

use std::time::Duration;

use tokio::time::Instant;

/// Admission primitive for a single caller identity.
///
/// Holds up to `capacity` tokens and regains `refill_rate` tokens per
/// second, continuously rather than in whole-token ticks. A bucket is born
/// full, so a new caller gets its whole burst allowance at once.
///
/// Capacity and refill rate are stored as given. A bucket whose capacity is
/// not positive (or is NaN) never admits, and a refill rate that is not
/// positive never refills. In both cases [`wait_time`](Self::wait_time)
/// reports [`Duration::MAX`] for any amount the bucket cannot reach.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Tokens after `elapsed` more seconds of refill, before the capacity cap.
    fn refilled(&self, elapsed: f64) -> f64 {
        if self.refill_rate > 0.0 {
            self.tokens + elapsed * self.refill_rate
        } else {
            self.tokens
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = self.refilled(elapsed).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill for the time elapsed since the last call, then try to withdraw
    /// `n` tokens.
    ///
    /// The refill is kept even when the withdrawal is rejected, so a
    /// rejected caller is not penalised twice.
    pub fn consume(&mut self, n: f64) -> bool {
        self.refill(Instant::now());
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Time until `n` tokens are available, assuming nobody else consumes.
    ///
    /// Rounded up to a whole microsecond and checked against the same
    /// arithmetic [`consume`](Self::consume) uses, so waiting exactly this
    /// long is enough. [`Duration::MAX`] when `n` is out of reach.
    pub fn wait_time(&self, n: f64) -> Duration {
        if self.tokens >= n {
            return Duration::ZERO;
        }
        let refills = self.refill_rate > 0.0;
        let reachable = n <= self.capacity;
        if !refills || !reachable {
            return Duration::MAX;
        }
        let secs = (n - self.tokens) / self.refill_rate;
        let mut micros = (secs * 1_000_000.0).ceil() as u64;
        // The quotient can land one ulp short of `n` once multiplied back.
        while micros < u64::MAX
            && self.refilled(Duration::from_micros(micros).as_secs_f64()) < n
        {
            micros += 1;
        }
        Duration::from_micros(micros)
    }

    /// Tokens available as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens regained per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// When the bucket was last refilled (i.e. last consulted).
    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// Whether the bucket would be full if refilled at `now`.
    pub(crate) fn is_full_at(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.refilled(elapsed) >= self.capacity
    }
}
