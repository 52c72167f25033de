//! Retry utility for transient failures in async operations
//!
//! The scheduler retries a probe when the executor reports a transient
//! failure (connection reset, timeout). Backoff belongs to the executor, so
//! the policy here only bounds the attempt count; an optional fixed delay is
//! kept for callers outside the scan path.

use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Errors that know whether another attempt could succeed
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Configurable retry policy for async operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// How a retried operation ended
#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// Terminal error, or the last transient error once attempts ran out
    Failed { error: E, attempts: u32 },
    /// Cancellation was observed between or during attempts
    Canceled { attempts: u32 },
}

/// Run `operation` until it succeeds, fails terminally, exhausts the policy
/// or `cancel` fires
///
/// The operation receives the zero-based attempt number.
///
/// # Examples
/// ```rust
/// use scanmatrix::core::retry::{retry_transient, RetryOutcome, RetryPolicy, Transient};
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Debug, PartialEq)]
/// struct Reset;
/// impl std::fmt::Display for Reset {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("connection reset")
///     }
/// }
/// impl Transient for Reset {
///     fn is_transient(&self) -> bool { true }
/// }
///
/// # async fn example() {
/// let outcome = retry_transient(
///     "probe",
///     &RetryPolicy::immediate(2),
///     &CancellationToken::new(),
///     |attempt| async move {
///         if attempt < 2 { Err(Reset) } else { Ok(attempt) }
///     },
/// )
/// .await;
/// assert_eq!(outcome, RetryOutcome::Succeeded { value: 2, attempts: 3 });
/// # }
/// ```
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Canceled { attempts: attempt };
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return RetryOutcome::Canceled { attempts: attempt + 1 };
            }
            result = operation(attempt) => result,
        };
        attempt += 1;

        match result {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(error) if error.is_transient() && attempt < max_attempts => {
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    error
                );
                if !policy.delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return RetryOutcome::Canceled { attempts: attempt };
                        }
                        _ = sleep(policy.delay) => {}
                    }
                }
            }
            Err(error) => {
                return RetryOutcome::Failed {
                    error,
                    attempts: attempt,
                }
            }
        }
    }
}
