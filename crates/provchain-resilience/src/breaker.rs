use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::failure::Failure;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation; calls pass through.
    Closed,
    /// Rejecting calls until the cooldown elapses.
    Open,
    /// One trial call in flight after the cooldown.
    HalfOpen,
}

/// Guard around a repeatedly failing dependency.
///
/// Closed until `threshold` consecutive failures accumulate, then Open:
/// calls are rejected immediately with a `Resource`-class failure, without
/// invoking the operation. Once `cooldown` elapses, the next call runs as a
/// Half-Open trial; success closes the circuit and resets the failure
/// count, failure reopens it.
///
/// Breakers are explicit values: construct one per guarded dependency and
/// share it where needed. There is no process-wide registry.
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    state: BreakerState,
    failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a breaker guarding the dependency called `name`.
    pub fn new(name: impl Into<String>, threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                opened_at: None,
            }),
        }
    }

    /// The name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, resolving an elapsed cooldown to `HalfOpen`.
    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock().expect("lock poisoned");
        match inner.state {
            BreakerState::Open if self.cooldown_elapsed(&inner) => BreakerState::HalfOpen,
            state => state,
        }
    }

    /// Number of consecutive failures recorded.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().expect("lock poisoned").failures
    }

    /// Run `op` through the breaker.
    ///
    /// Returns a `Resource`-class failure immediately (without invoking
    /// `op`) while the circuit is open.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, Failure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        // Admission check. The guard must not be held across the await.
        {
            let mut inner = self.inner.lock().expect("lock poisoned");
            match inner.state {
                BreakerState::Closed | BreakerState::HalfOpen => {}
                BreakerState::Open => {
                    if self.cooldown_elapsed(&inner) {
                        debug!(breaker = %self.name, "cooldown elapsed, trial call");
                        inner.state = BreakerState::HalfOpen;
                    } else {
                        return Err(Failure::resource(format!(
                            "circuit '{}' is open",
                            self.name
                        )));
                    }
                }
            }
        }

        match op().await {
            Ok(value) => {
                let mut inner = self.inner.lock().expect("lock poisoned");
                if inner.state != BreakerState::Closed {
                    debug!(breaker = %self.name, "closing circuit");
                }
                inner.state = BreakerState::Closed;
                inner.failures = 0;
                inner.opened_at = None;
                Ok(value)
            }
            Err(failure) => {
                let mut inner = self.inner.lock().expect("lock poisoned");
                inner.failures += 1;
                let reopen = inner.state == BreakerState::HalfOpen;
                if reopen || inner.failures >= self.threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.failures,
                        "opening circuit"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
                Err(failure)
            }
        }
    }

    fn cooldown_elapsed(&self, inner: &Inner) -> bool {
        inner
            .opened_at
            .map(|at| at.elapsed() >= self.cooldown)
            .unwrap_or(true)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::failure::FailureKind;

    async fn fail(breaker: &CircuitBreaker) -> Result<(), Failure> {
        breaker
            .call(|| async { Err::<(), _>(Failure::network("down")) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, Failure> {
        breaker.call(|| async { Ok(1) }).await
    }

    #[tokio::test]
    async fn starts_closed_and_passes_through() {
        let breaker = CircuitBreaker::new("store", 3, Duration::from_secs(60));
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(succeed(&breaker).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("store", 3, Duration::from_secs(60));
        for _ in 0..3 {
            assert_eq!(fail(&breaker).await.unwrap_err().kind, FailureKind::Network);
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        // 4th call is rejected without invoking the operation.
        let calls = AtomicU32::new(0);
        let result = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Resource);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn half_open_success_closes() {
        let breaker = CircuitBreaker::new("store", 2, Duration::from_millis(5));
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("store", 2, Duration::from_millis(5));
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Trial call fails: straight back to Open.
        fail(&breaker).await.unwrap_err();
        let result = succeed(&breaker).await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Resource);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new("store", 3, Duration::from_secs(60));
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn rejection_names_the_circuit() {
        let breaker = CircuitBreaker::new("deal-ledger", 1, Duration::from_secs(60));
        fail(&breaker).await.unwrap_err();
        let failure = succeed(&breaker).await.unwrap_err();
        assert!(failure.message.contains("deal-ledger"));
    }
}
