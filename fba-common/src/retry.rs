//! Retry logic for transient storage contention
//!
//! SQLite admits one writer at a time. Under load a write transaction can be
//! rejected with SQLITE_BUSY; the whole operation is then re-run with
//! exponential backoff. Classification goes through [`Retryable::kind`], so
//! only failures of kind [`ErrorKind::Busy`] are retried and everything else
//! propagates on the first attempt.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::error::{Error, ErrorKind};

/// Bounded exponential backoff policy
///
/// Attempt `n` (1-based) that fails with a busy error sleeps
/// `base_delay_ms * 2^(n-1)`, capped at `max_delay_ms`, before attempt `n+1`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Errors that can tell the retry loop whether another attempt makes sense
pub trait Retryable {
    fn kind(&self) -> ErrorKind;
}

impl Retryable for Error {
    fn kind(&self) -> ErrorKind {
        Error::kind(self)
    }
}

/// Returned when every attempt failed with a busy error
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
    pub elapsed_ms: u128,
    pub last_error: String,
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} still busy after {} attempts ({} ms): {}",
            self.operation, self.attempts, self.elapsed_ms, self.last_error
        )
    }
}

impl std::error::Error for RetryExhausted {}

/// Run `operation` until it succeeds, fails with a non-busy error, or the
/// policy's attempts are used up.
///
/// The closure is invoked once per attempt and must rebuild its whole unit of
/// work (for transactions: begin, statements, commit) each time.
pub async fn with_retry<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Retryable + From<RetryExhausted> + fmt::Display,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying storage operation");
        }

        let err = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Storage operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if err.kind() != ErrorKind::Busy {
            return Err(err);
        }

        if attempt >= max_attempts {
            let elapsed_ms = start_time.elapsed().as_millis();
            tracing::error!(
                operation = operation_name,
                attempt,
                elapsed_ms = elapsed_ms as u64,
                "Storage still busy, giving up"
            );
            return Err(E::from(RetryExhausted {
                operation: operation_name.to_string(),
                attempts: attempt,
                elapsed_ms,
                last_error: err.to_string(),
            }));
        }

        let backoff = policy.backoff(attempt);
        tracing::warn!(
            operation = operation_name,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Storage busy, will retry after backoff"
        );
        tokio::time::sleep(backoff).await;
    }
}
