//! Process-wide request pacing shared by every scraper.
//!
//! A single token bucket (GCRA via `governor`) refills continuously at a fixed
//! period up to a burst capacity. Callers never see the bucket state; the only
//! entry point is [`RateLimiter::acquire`], which suspends the calling task
//! until a token is free or the run context finishes.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};

use crate::scrape::context::{RunContext, ScrapeError};

pub struct RateLimiter {
    inner: DefaultDirectRateLimiter,
    refill_every: Duration,
    burst: u32,
}

impl RateLimiter {
    /// One token every `refill_every`, at most `burst` banked.
    pub fn new(refill_every: Duration, burst: u32) -> Self {
        let refill_every = refill_every.max(Duration::from_micros(1));
        let burst_nz = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(refill_every)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst_nz);

        Self {
            inner: DefaultDirectRateLimiter::direct(quota),
            refill_every,
            burst: burst_nz.get(),
        }
    }

    /// `rate` tokens per second, at most `burst` banked.
    pub fn per_second(rate: u32, burst: u32) -> Self {
        let rate = rate.max(1);
        Self::new(Duration::from_secs(1) / rate, burst)
    }

    pub fn refill_every(&self) -> Duration {
        self.refill_every
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Wait for a token. A finished context wins ties and consumes nothing.
    pub async fn acquire(&self, ctx: &RunContext) -> Result<(), ScrapeError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            _ = self.inner.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("refill_every", &self.refill_every)
            .field("burst", &self.burst)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_inputs_are_clamped() {
        let rl = RateLimiter::new(Duration::ZERO, 0);
        assert_eq!(rl.burst(), 1);
        assert!(rl.refill_every() > Duration::ZERO);

        let rl = RateLimiter::per_second(4, 2);
        assert_eq!(rl.refill_every(), Duration::from_millis(250));
        assert_eq!(rl.burst(), 2);
    }

    #[tokio::test]
    async fn burst_is_available_immediately() {
        let rl = RateLimiter::new(Duration::from_secs(30), 3);
        let ctx = RunContext::background();
        let t0 = std::time::Instant::now();
        for _ in 0..3 {
            rl.acquire(&ctx).await.unwrap();
        }
        assert!(t0.elapsed() < Duration::from_secs(1));
    }
}
