//! Bounded retry with a pluggable backoff schedule.

use quillpost_core::models::UploadAttempt;
use quillpost_core::ClientConfig;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// How many times to try and how long to wait between tries.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    /// Wait `k × step` after the k-th failed attempt.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::new(max_attempts, move |attempt| step * attempt)
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, |_| Duration::ZERO)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::linear(
            config.max_attempts,
            Duration::from_millis(config.backoff_step_ms),
        )
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(1))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Every attempt failed; carries the last error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub last_error: E,
    pub attempts: u32,
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_with_observer(policy, op, |_| {}).await
}

/// Like [`retry_with_backoff`], reporting each finished attempt to `observer`.
pub async fn retry_with_observer<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    mut op: F,
    mut observer: O,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    O: FnMut(&UploadAttempt),
{
    let max_attempts = policy.max_attempts;
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                observer(&UploadAttempt {
                    number: attempt,
                    error: None,
                });
                return Ok(value);
            }
            Err(e) => {
                observer(&UploadAttempt {
                    number: attempt,
                    error: Some(e.to_string()),
                });

                if attempt >= max_attempts {
                    tracing::error!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Giving up after final attempt"
                    );
                    return Err(RetryExhausted {
                        last_error: e,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
