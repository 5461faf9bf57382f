//! Reconnection Policy
//!
//! Exponential backoff with jitter between upstream dial attempts.

use std::time::Duration;

use rand::Rng;

/// Default delay before the first reconnect.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound for the delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// Growth factor applied after every attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts allowed before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Same settings with jitter disabled.
    #[must_use]
    pub fn without_jitter(self) -> Self {
        Self {
            jitter_factor: 0.0,
            ..self
        }
    }
}

/// Tracks consecutive failed attempts and hands out the next delay.
///
/// ```rust
/// use relay_datasource::application::services::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
/// assert!(policy.next_delay().is_some());
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a policy with no attempts recorded.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Record an attempt and return how long to wait before it.
    ///
    /// Returns `None` once `max_attempts` is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;

        let delay = jittered(self.current_delay, self.config.jitter_factor);
        self.current_delay = grow(
            self.current_delay,
            self.config.multiplier,
            self.config.max_delay,
        );
        Some(delay)
    }

    /// Forget previous failures after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts recorded since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    /// Configured attempt limit (0 = unlimited).
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

fn grow(delay: Duration, multiplier: f64, max: Duration) -> Duration {
    let scaled = delay.as_secs_f64() * multiplier;
    if !scaled.is_finite() || scaled <= 0.0 {
        return Duration::ZERO;
    }
    if scaled >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(scaled).min(max)
}

fn jittered(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }

    #[allow(clippy::cast_precision_loss)]
    let base = delay.as_millis() as f64;
    let spread = base * factor;
    let offset: f64 = rand::rng().random_range(-spread..=spread);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let millis = (base + offset).max(1.0) as u64;
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial_ms: u64, max_ms: u64, multiplier: f64, max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
        assert!((config.jitter_factor - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn delays_double_until_cap() {
        let mut policy = ReconnectPolicy::new(config(500, 3_000, 2.0, 0));

        let delays: Vec<u128> = (0..6)
            .map(|_| policy.next_delay().unwrap().as_millis())
            .collect();

        assert_eq!(delays, vec![500, 1_000, 2_000, 3_000, 3_000, 3_000]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut policy = ReconnectPolicy::new(config(10, 100, 2.0, 2));

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
        assert_eq!(policy.attempt_count(), 2);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut policy = ReconnectPolicy::new(config(100, 10_000, 3.0, 2));
        let _ = policy.next_delay();
        let _ = policy.next_delay();

        policy.reset();

        assert!(policy.should_retry());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                initial_delay: Duration::from_millis(1_000),
                ..ReconnectConfig::default()
            });
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1_100).contains(&millis), "delay {millis}ms out of range");
        }
    }

    #[test]
    fn zero_multiplier_collapses_to_zero() {
        let mut policy = ReconnectPolicy::new(config(100, 1_000, 0.0, 0));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::ZERO));
    }

    #[test]
    fn unlimited_attempts_never_stop() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default().without_jitter());
        for _ in 0..1_000 {
            assert!(policy.next_delay().is_some());
        }
        assert_eq!(policy.max_attempts(), 0);
    }
}
