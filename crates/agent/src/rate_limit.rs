use std::sync::Mutex;
use std::time::Instant;

use ration_core::config::RateLimitConfig;
use tracing::warn;

/// Non-blocking admission check for outbound model calls.
pub trait RateLimiter: Send + Sync {
    fn try_acquire(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UnlimitedRateLimiter;

impl RateLimiter for UnlimitedRateLimiter {
    fn try_acquire(&self) -> bool {
        true
    }
}

/// Token bucket that holds up to `burst` tokens and refills lazily from the
/// time elapsed since the last acquire.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    name: &'static str,
    burst: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketLimiter {
    pub fn new(name: &'static str, burst: u32, refill_per_sec: f64) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            name,
            burst,
            refill_per_sec: refill_per_sec.max(0.0),
            bucket: Mutex::new(Bucket { tokens: burst, last_refill: Instant::now() }),
        }
    }

    pub fn from_config(name: &'static str, config: &RateLimitConfig) -> Self {
        Self::new(name, config.burst, config.refill_per_sec)
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let Ok(mut bucket) = self.bucket.lock() else {
            warn!(event_name = "agent.rate_limit.poisoned", limiter = self.name, "limiter lock poisoned");
            return false;
        };

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return true;
        }

        warn!(
            event_name = "agent.rate_limit.denied",
            limiter = self.name,
            available = bucket.tokens,
            "rate limited"
        );
        false
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }
}
