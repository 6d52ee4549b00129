//! Reconnect policy for the push channel.

use std::time::Duration;

use examdash_core::defaults;
use rand::Rng;

/// Bounded exponential backoff with optional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Ceiling for the doubled delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Consecutive failed connects before giving up. 0 means never give up.
    pub max_attempts: u32,
    /// Up to this fraction of the delay is added as random jitter.
    pub jitter_ratio: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: defaults::RECONNECT_INITIAL_DELAY_MS,
            max_delay_ms: defaults::RECONNECT_MAX_DELAY_MS,
            max_attempts: defaults::RECONNECT_MAX_ATTEMPTS,
            jitter_ratio: defaults::RECONNECT_JITTER_RATIO,
        }
    }
}

impl ReconnectPolicy {
    /// Create policy from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `EXAMDASH_RECONNECT_INITIAL_MS` | `500` | First retry delay |
    /// | `EXAMDASH_RECONNECT_MAX_MS` | `30000` | Backoff ceiling |
    /// | `EXAMDASH_RECONNECT_MAX_ATTEMPTS` | `10` | Failed connects before giving up (0 = unlimited) |
    pub fn from_env() -> Self {
        let initial_delay_ms = std::env::var("EXAMDASH_RECONNECT_INITIAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::RECONNECT_INITIAL_DELAY_MS)
            .max(1);

        let max_delay_ms = std::env::var("EXAMDASH_RECONNECT_MAX_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::RECONNECT_MAX_DELAY_MS)
            .max(initial_delay_ms);

        let max_attempts = std::env::var("EXAMDASH_RECONNECT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::RECONNECT_MAX_ATTEMPTS);

        Self {
            initial_delay_ms,
            max_delay_ms,
            max_attempts,
            jitter_ratio: defaults::RECONNECT_JITTER_RATIO,
        }
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Delay without jitter after `failures` consecutive failed attempts.
    pub fn base_delay(&self, failures: u32) -> Duration {
        let factor = 1u64.checked_shl(failures.min(32)).unwrap_or(u64::MAX);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms.max(self.initial_delay_ms));
        Duration::from_millis(ms)
    }

    /// Delay with jitter applied.
    pub fn delay(&self, failures: u32) -> Duration {
        let base = self.base_delay(failures);
        if self.jitter_ratio <= 0.0 {
            return base;
        }
        let max_jitter = (base.as_millis() as f64 * self.jitter_ratio) as u64;
        if max_jitter == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
    }

    /// Whether `failures` consecutive failures exhaust the policy.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }
}
