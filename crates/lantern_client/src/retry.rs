//! Exponential backoff for transient client faults.

use lantern_error::{ClientError, ClientErrorKind, ClientResult, RetryableError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Delay before retry number `attempt` (zero-based): `base × 2^attempt`.
///
/// Saturates instead of overflowing for absurd attempt counts.
///
/// # Examples
///
/// ```
/// use lantern_client::backoff_delay;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(100);
/// assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
/// assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
/// ```
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX)
}

/// Retry policy of one server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` attempts after the first.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Base delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Waits between attempts, in order. Yields exactly `max_retries` items.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let base = self.base_delay;
        (0..self.max_retries).map(move |attempt| backoff_delay(base, attempt))
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of retries.
    ///
    /// `op` receives the zero-based attempt number. Transient faults that
    /// outlast every retry come back as
    /// [`ClientErrorKind::RetriesExhausted`] carrying the last cause.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> ClientResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let max_retries = self.max_retries;

        let outcome = Retry::spawn(self.delays(), || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            let call = op(attempt);
            async move {
                match call.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() => {
                        if attempt < max_retries {
                            warn!(attempt, error = %e, "Transient fault, will retry");
                        }
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => {
                        debug!(attempt, error = %e, "Permanent fault, not retrying");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() => {
                Err(ClientError::new(ClientErrorKind::RetriesExhausted {
                    attempts: attempts.load(Ordering::SeqCst),
                    cause: e.kind.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }
}
