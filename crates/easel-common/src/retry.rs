//! Exponential backoff for sync task runs.

use std::future::Future;
use std::time::{Duration, SystemTime};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Attempt budget and backoff curve for [`retry_if`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total runs, the first included. Zero is treated as one.
    pub max_attempts: u32,
    /// Wait before the second run.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Each later wait is the previous one times this.
    pub backoff_multiplier: f64,
    /// Stretch each wait by up to a quarter.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Wait before run number `attempt` (1-based). The first run starts
    /// immediately. A curve that leaves the representable range (huge or
    /// negative multiplier) is pinned to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(step) = attempt.checked_sub(2) else {
            return Duration::ZERO;
        };
        let exponent = i32::try_from(step).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter {
            delay.saturating_add(delay.mul_f64(jitter_fraction() * 0.25))
        } else {
            delay
        }
    }
}

/// Clock-derived value in `[0, 1]`.
fn jitter_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos) / 1e9
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// `config.max_attempts` runs have failed.
pub async fn retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Operation failed");
                if attempt >= max_attempts || !should_retry(&e) {
                    return Err(e);
                }
            }
        }

        attempt += 1;
        let delay = config.delay_for_attempt(attempt);
        debug!(attempt, ?delay, "Retrying after delay");
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EaselError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_respects_max() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(15),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(15));
    }

    #[test]
    fn test_degenerate_multiplier_is_pinned_to_max() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            backoff_multiplier: -3.0,
            jitter: true,
            ..Default::default()
        };

        let delay = config.delay_for_attempt(3);
        assert!(delay >= Duration::from_secs(15));
        assert!(delay <= Duration::from_secs(15).mul_f64(1.25));
        assert!(config.delay_for_attempt(u32::MAX) <= Duration::from_secs(19));
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<i32, &str> = retry_if(
            &fast(),
            || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), &str> = retry_if(
            &fast(),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("disk full") }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err("disk full"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_if_stops_on_permanent_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), EaselError> = retry_if(
            &fast(),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(EaselError::storage("quota exceeded")) }
            },
            EaselError::is_retryable,
        )
        .await;

        assert!(matches!(result, Err(EaselError::Storage { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
