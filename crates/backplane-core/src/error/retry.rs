//! # Retry Logic with Exponential Backoff
//!
//! A single reusable retry loop, generalized over the caller's error type so
//! it can wrap provider API calls, notification webhook posts, and any other
//! operation with its own notion of "retryable". Per design note §9, this is
//! the one utility reused at every (operation, op-name, max-attempts,
//! is-retryable, base-delay, cap) call site outside of the event pipeline's
//! webhook delivery, which keeps its own absolute-deadline scheduling because
//! its backoff state must survive actor restarts (see `backplane-events`).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration: attempts, delay bounds, and backoff shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Exponential backoff multiplier applied per attempt.
    pub multiplier: f64,
    /// Jitter fraction in `[0.0, 1.0)` applied to each computed delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// The policy spec §4.D prescribes for the Deployment Client: base 1s
    /// doubling, capped at 30s, 3 attempts total, no jitter (the provider
    /// already rate-limits; added jitter would only blur test assertions).
    pub fn provider_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Delay before the given attempt number (1-indexed; attempt 1 has no
    /// delay, since it's the first try).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let mut delay_ms = self.initial_delay.as_millis() as f64;
        if self.multiplier > 1.0 {
            delay_ms *= self.multiplier.powi(attempt as i32 - 2);
        }
        delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        if self.jitter_factor > 0.0 {
            let jitter = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
            delay_ms *= 1.0 + jitter;
        }

        Duration::from_millis(delay_ms.max(0.0) as u64)
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between attempts per
/// `policy`, stopping as soon as `is_retryable` returns `false` for the
/// latest error or attempts are exhausted. Returns the last error on
/// exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(
    op_name: &str,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let exhausted = attempt >= policy.max_attempts;
                if exhausted || !is_retryable(&err) {
                    if exhausted {
                        tracing::warn!(op = op_name, attempts = attempt, "retries exhausted");
                    }
                    return Err(err);
                }
                attempt += 1;
                let delay = policy.calculate_delay(attempt);
                tracing::debug!(op = op_name, attempt, delay_ms = delay.as_millis() as u64, "retrying after error");
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_zero_on_first_attempt() {
        let policy = RetryPolicy::provider_default();
        assert_eq!(policy.calculate_delay(1), Duration::ZERO);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::provider_default();
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(2));
        assert_eq!(policy.calculate_delay(4), Duration::from_secs(4));
        // Would be 8s at attempt 5, well under the 30s cap; push further out.
        assert_eq!(policy.calculate_delay(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::provider_default()
        };
        let result: Result<u32, &str> = retry_with_backoff("test", &policy, |_| true, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err("transient")
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::provider_default();
        let result: Result<(), &str> = retry_with_backoff("test", &policy, |_| false, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("permanent")
        })
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 1.0,
            jitter_factor: 0.0,
        };
        let result: Result<(), &str> = retry_with_backoff("test", &policy, |_| true, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("transient")
        })
        .await;
        assert_eq!(result, Err("transient"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
