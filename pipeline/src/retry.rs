//! Exponential backoff with jitter for transient UNAB failures.
//!
//! The pipeline's real retry mechanism is the per-record failure counter:
//! a record that fails a pass is picked up again on the next run. This
//! module only smooths over short network blips inside a single call, so
//! its defaults are deliberately tight.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Re-attempts after the first failure.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the computed delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries, useful where the failure counter alone
    /// should drive re-attempts.
    #[must_use]
    pub const fn no_retries() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt`, with up to 25% random jitter so
    /// concurrent jobs do not hammer the endpoint in lockstep.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = Duration::from_millis(base_ms as u64).min(self.max_delay);
        let jitter_ms = capped.as_millis() as u64 / 4;
        if jitter_ms == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Retries `operation` while `is_transient` says the error could clear up.
///
/// # Errors
///
/// Returns the last error once a non-transient failure occurs or the retry
/// budget is exhausted.
pub async fn retry_transient<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "call succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "transient failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        };

        assert!(policy.delay_for_attempt(0) >= Duration::from_millis(100));
        assert!(policy.delay_for_attempt(1) >= Duration::from_millis(200));
        // 100ms * 2^6 = 6.4s, capped at 1s plus at most 25% jitter.
        assert!(policy.delay_for_attempt(6) <= Duration::from_millis(1250));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_to_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_transient(
            &quick(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("connection reset")
                    } else {
                        Ok(7)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<i32, &str> = retry_transient(
            &quick(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("bad credentials")
                }
            },
            |e| !e.contains("credentials"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<i32, String> = retry_transient(
            &quick(),
            || {
                let c = Arc::clone(&counter);
                async move { Err(format!("attempt {}", c.fetch_add(1, Ordering::SeqCst))) }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "attempt 3");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
