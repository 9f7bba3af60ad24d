use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetrySection;
use crate::error::{HarnessError, HarnessResult};

/// Bounded retry with a fixed inter-attempt backoff.
///
/// Only transient failures are retried (see
/// [`HarnessError::is_transient`]); anything structural propagates on
/// the attempt that produced it. Retry exists for external-world
/// flakiness, not for logic bugs.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Duration,
    retry_timeouts: bool,
}

impl RetryPolicy {
    pub fn new(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            backoff: Duration::from_millis(section.backoff_ms),
            retry_timeouts: section.retry_timeouts,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Runs `operation` up to the attempt budget, raising the last
    /// transient error once the budget is exhausted.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> HarnessResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HarnessResult<T>>,
    {
        let mut attempt = 0usize;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_transient(self.retry_timeouts) {
                        return Err(error);
                    }
                    attempt += 1;
                    warn!(label, attempt, error = %error, "transient failure");
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    sleep(self.backoff).await;
                }
            }
        }
    }

    /// Like [`RetryPolicy::run`] but resolves to `Ok(None)` when the
    /// attempt budget runs out, for call sites that prefer a sentinel
    /// over a hard failure.
    pub async fn run_tolerant<F, Fut, T>(
        &self,
        label: &str,
        operation: F,
    ) -> HarnessResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HarnessResult<T>>,
    {
        match self.run(label, operation).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_transient(self.retry_timeouts) => {
                warn!(label, error = %error, "retry budget exhausted, resolving to none");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(&RetrySection {
            max_attempts,
            backoff_ms: 0,
            retry_timeouts: false,
        })
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_op = Arc::clone(&calls);
        let result = policy(5)
            .run("test", move || {
                let calls = Arc::clone(&calls_for_op);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(HarnessError::retriable("not yet"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_the_attempt_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_op = Arc::clone(&calls);
        let result = policy(3)
            .run("test", move || {
                let calls = Arc::clone(&calls_for_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(HarnessError::retriable("always"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_propagates_on_first_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_op = Arc::clone(&calls);
        let result = policy(5)
            .run("test", move || {
                let calls = Arc::clone(&calls_for_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(HarnessError::Structural("broken widget".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(HarnessError::Structural(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tolerant_resolves_to_none_on_exhaustion() {
        let result = policy(2)
            .run_tolerant("test", || async {
                Err::<(), _>(HarnessError::retriable("always"))
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn tolerant_still_raises_structural_errors() {
        let result = policy(2)
            .run_tolerant("test", || async {
                Err::<(), _>(HarnessError::Configuration("bad".into()))
            })
            .await;
        assert!(matches!(result, Err(HarnessError::Configuration(_))));
    }

    #[tokio::test]
    async fn timeouts_retry_only_when_configured() {
        let section = RetrySection {
            max_attempts: 3,
            backoff_ms: 0,
            retry_timeouts: true,
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_op = Arc::clone(&calls);
        let result = RetryPolicy::new(&section)
            .run("test", move || {
                let calls = Arc::clone(&calls_for_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(HarnessError::Timeout("pager".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
