use rand::Rng;
use std::time::Duration;

use crate::config::RetrySettings;

/// Retry configuration for transport failures.
///
/// Only timeouts and refused connections are retried; any HTTP status,
/// including 5xx, is a result the assertions must see.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based), with `jitter` in `[0, 1)`
    /// spreading it by +-10%.
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = attempt.saturating_sub(1);
        let base = 1u64
            .checked_shl(exp)
            .and_then(|factor| self.initial_delay_ms.checked_mul(factor))
            .unwrap_or(self.max_delay_ms)
            .min(self.max_delay_ms);
        let spread = (base as f64 * 0.1 * (jitter - 0.5) * 2.0) as i64;
        Duration::from_millis(base.saturating_add_signed(spread))
    }

    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay_for(attempt, rand_jitter())
    }
}

/// Random jitter value in `[0, 1)`
fn rand_jitter() -> f64 {
    rand::rng().random::<f64>()
}
