//! Exponential backoff with optional jitter.
//!
//! [`BackoffConfig`] controls how failed upstream calls are retried with
//! increasing delays. It drives both transport retry for the text-generation
//! call (off by default) and the per-panel retry loop of the image stage
//! ([`BackoffConfig::panel_images()`]).

use std::time::Duration;

/// Configuration for retry with exponential backoff and jitter.
///
/// # Example
///
/// ```
/// use comic_pipeline::backend::BackoffConfig;
///
/// let none = BackoffConfig::none();
/// assert_eq!(none.max_retries, 0);
///
/// // Three attempts in total for each comic panel.
/// let panels = BackoffConfig::panel_images();
/// assert_eq!(panels.max_attempts(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of retries after the first attempt. Default: 0 (no retry).
    pub max_retries: u32,

    /// Initial delay before first retry. Default: 1 second.
    pub initial_delay: Duration,

    /// Multiplier applied to delay after each retry. Default: 2.0.
    /// Delay grows: initial, initial * multiplier, initial * multiplier^2, ...
    pub multiplier: f64,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Jitter strategy.
    pub jitter: JitterStrategy,

    /// HTTP status codes that trigger transport retry. Default: `[429, 500, 502, 503, 504]`.
    pub retryable_statuses: Vec<u16>,

    /// Whether to respect `Retry-After` headers from the provider.
    pub respect_retry_after: bool,
}

/// Jitter strategy to prevent thundering herd on shared rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    None,

    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,

    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

impl BackoffConfig {
    /// No retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Cloud API defaults: 3 retries, 1s initial, 2x multiplier,
    /// 60s max, full jitter, respects Retry-After.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::Full,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }

    /// Per-panel image retry: 3 attempts in total, 1s base delay doubling
    /// per attempt, capped at 10s, no jitter.
    pub fn panel_images() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: JitterStrategy::None,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: false,
        }
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculate the delay for retry N (0-indexed).
    ///
    /// The base delay is `initial_delay * multiplier^attempt`, capped at
    /// `max_delay`. Jitter is then applied according to the configured strategy.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_exponential() {
        let config = BackoffConfig {
            jitter: JitterStrategy::None,
            ..BackoffConfig::standard()
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_panel_images_capped_at_ten_seconds() {
        let config = BackoffConfig::panel_images();
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(20), Duration::from_secs(10));
    }

    #[test]
    fn test_panel_images_preset() {
        let config = BackoffConfig::panel_images();
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.jitter, JitterStrategy::None);
        assert!(config.delay_for_attempt(0) < config.delay_for_attempt(1));
    }

    #[test]
    fn test_backoff_jitter_full_in_range() {
        let config = BackoffConfig::standard();
        for _ in 0..100 {
            let d = config.delay_for_attempt(1);
            assert!(d <= Duration::from_secs(2), "delay {:?} > 2s", d);
        }
    }

    #[test]
    fn test_backoff_jitter_equal_lower_bound() {
        let config = BackoffConfig {
            jitter: JitterStrategy::Equal,
            ..BackoffConfig::standard()
        };
        for _ in 0..100 {
            let d = config.delay_for_attempt(1);
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_backoff_none_preset() {
        assert_eq!(BackoffConfig::none().max_retries, 0);
        assert_eq!(BackoffConfig::default().max_attempts(), 1);
    }
}
