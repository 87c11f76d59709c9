use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::failure::Failure;

/// Retry with exponential backoff.
///
/// The delay before retry `n` (zero-based) is
/// `min(base_delay * multiplier^n, max_delay)`, optionally with jitter to
/// spread out synchronized retries. Retrying stops on the first
/// non-retryable failure or once `max_retries` attempts are exhausted; the
/// last classified failure is returned either way.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Backoff multiplier applied per attempt.
    pub multiplier: u32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Useful in tests and for operations whose
    /// callers do their own scheduling.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// The backoff delay before retry `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter {
            use rand::Rng;
            let extra = (delay.as_millis() as f64 * 0.1 * rand::thread_rng().gen::<f64>()) as u64;
            delay + Duration::from_millis(extra)
        } else {
            delay
        }
    }

    /// Run `op` under this policy.
    ///
    /// `op` is invoked up to `max_retries + 1` times. A non-retryable
    /// failure stops the loop immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(failure) if !failure.is_retryable() || attempt >= self.max_retries => {
                    return Err(failure);
                }
                Err(failure) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        attempt,
                        kind = %failure.kind,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run `op` under this policy, bounded by an overall deadline.
    ///
    /// The deadline covers the entire retry loop, not individual attempts. A
    /// hung operation surfaces as a retryable network-class failure instead
    /// of blocking the caller indefinitely.
    pub async fn run_with_deadline<T, F, Fut>(
        &self,
        deadline: Duration,
        op: F,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        match tokio::time::timeout(deadline, self.run(op)).await {
            Ok(result) => result,
            Err(_) => Err(Failure::network(format!(
                "deadline of {}ms exceeded",
                deadline.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::failure::FailureKind;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2,
            max_delay: Duration::from_millis(8),
            jitter: false,
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            multiplier: 2,
            max_delay: Duration::from_millis(500),
            jitter: false,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500)); // capped
        assert_eq!(policy.delay_for(30), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Failure>(42)
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Failure::network("flaky"))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::storage("still down"))
            })
            .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Storage);
        // 1 initial + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::verification("tampered"))
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Verification);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_classifies_as_network() {
        let policy = RetryPolicy::none();
        let result: Result<(), _> = policy
            .run_with_deadline(Duration::from_millis(10), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Network);
        assert!(failure.is_retryable());
    }

    #[tokio::test]
    async fn deadline_passes_through_success() {
        let policy = RetryPolicy::none();
        let result = policy
            .run_with_deadline(Duration::from_secs(5), || async { Ok::<_, Failure>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }
}
