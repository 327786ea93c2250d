//! Backoff Policy
//!
//! Pure, deterministic mapping from a consecutive-failure count to a wait
//! duration and a mode decision: keep retrying the upstream, or give up and
//! switch to the synthetic generator.
//!
//! The policy carries no state of its own: the same streak always yields
//! the same decision, so reconnect behavior is reproducible in tests without
//! real timing.

use std::time::Duration;

/// Configuration for backoff behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the wait.
    pub max_delay: Duration,
    /// Once the computed wait reaches this, the session stops retrying the
    /// upstream and falls back to simulation.
    pub simulate_threshold: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            simulate_threshold: Duration::from_secs(20),
        }
    }
}

/// Outcome of consulting the policy after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffDecision {
    /// How long to wait before acting.
    pub wait: Duration,
    /// Whether to switch to the synthetic generator instead of retrying.
    pub should_simulate: bool,
}

/// Exponential backoff policy with a fallback threshold.
///
/// # Example
///
/// ```rust
/// use feed_relay::infrastructure::okx::backoff::{BackoffConfig, BackoffPolicy};
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::new(BackoffConfig::default());
///
/// let first = policy.next(0);
/// assert_eq!(first.wait, Duration::from_secs(5));
/// assert!(!first.should_simulate);
///
/// let third = policy.next(2);
/// assert_eq!(third.wait, Duration::from_secs(20));
/// assert!(third.should_simulate);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
}

impl BackoffPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Decide the wait and mode for the given consecutive-failure count.
    ///
    /// `failure_streak` is the number of consecutive failures observed
    /// *before* the one being handled, so the first failure waits the base
    /// delay: base, base·2, base·4, ... capped at the maximum.
    #[must_use]
    pub fn next(&self, failure_streak: u32) -> BackoffDecision {
        let base_ms = self.config.base_delay.as_millis();
        let max_ms = self.config.max_delay.as_millis();

        // Shift in u128 millis; a streak past 64 would overflow the shift
        // but is far beyond the cap anyway.
        let wait_ms = if failure_streak >= 64 {
            max_ms
        } else {
            base_ms.saturating_mul(1u128 << failure_streak).min(max_ms)
        };
        let wait = Duration::from_millis(u64::try_from(wait_ms).unwrap_or(u64::MAX));

        BackoffDecision {
            wait,
            should_simulate: wait >= self.config.simulate_threshold,
        }
    }
}
