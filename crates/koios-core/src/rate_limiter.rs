//! Minimum-interval rate limiter.
//!
//! A requests-per-second ceiling `R` becomes a minimum spacing of `1s / R`
//! between the start times of consecutive requests. The state only records
//! the watermark (the start time of the most recently scheduled request);
//! locking and sleeping are done by [`crate::state::ClientState`].

use std::time::{Duration, Instant};

use crate::error::{KoiosError, Result};

/// A validated requests-per-second ceiling (1-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit(u8);

impl RateLimit {
    pub fn new(reqps: u8) -> Result<Self> {
        if reqps == 0 {
            return Err(KoiosError::InvalidConfiguration(
                "rate limit must be between 1-255 requests per sec".into(),
            ));
        }
        Ok(Self(reqps))
    }

    pub fn requests_per_second(self) -> u8 {
        self.0
    }

    /// Spacing between request start times: 1s down to ~3.9ms.
    pub fn interval(self) -> Duration {
        Duration::from_secs(1) / u32::from(self.0)
    }
}

/// Watermark state of the limiter.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    limit: RateLimit,
    last_request_at: Option<Instant>,
}

impl RateLimitState {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            last_request_at: None,
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    pub fn min_interval(&self) -> Duration {
        self.limit.interval()
    }

    pub fn set_limit(&mut self, limit: RateLimit) {
        self.limit = limit;
    }

    pub fn last_request_at(&self) -> Option<Instant> {
        self.last_request_at
    }

    /// Reserve the next dispatch slot at or after `now`.
    ///
    /// Returns how long the caller must wait before dispatching. The
    /// watermark moves to the reserved start time immediately, so a
    /// concurrent caller reserving next is scheduled after this one.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        let wait = match self.last_request_at {
            // The watermark may itself lie in the future when earlier
            // callers are still sleeping towards their slot.
            Some(last) => (last + self.min_interval()).saturating_duration_since(now),
            None => Duration::ZERO,
        };
        self.last_request_at = Some(now + wait);
        wait
    }
}
