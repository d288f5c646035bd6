//! One retry policy for every network submission path.
//!
//! RPC sends, aggregator calls and registry fetches all flake the same way on
//! congested networks, so they all go through this policy instead of carrying
//! their own ad-hoc loops.

use std::future::Future;
use std::time::Duration;

use crate::config::CONFIG;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: CONFIG.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(CONFIG.retry.base_delay_ms),
            multiplier: CONFIG.retry.multiplier.max(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: multiplier.max(1),
        }
    }

    /// Delay before the attempt after `attempt` (1-based) has failed.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds or the attempt budget is spent. The last
    /// error is returned as-is so callers keep their own error types.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{what} succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= self.max_attempts => {
                    tracing::warn!("{what} failed after {attempt} attempts: {err}");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        "{what} attempt {attempt}/{} failed: {err}, retrying in {:?}",
                        self.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), 2)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = fast_policy(5)
            .run("test op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 { Err("transient".to_string()) } else { Ok(n) }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = fast_policy(3)
            .run("test op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {n}")) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let result: Result<&str, &str> = fast_policy(3).run("test op", || async { Ok("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = fast_policy(4);
        assert_eq!(policy.delay_after(1), Duration::from_millis(1));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4));
    }
}
