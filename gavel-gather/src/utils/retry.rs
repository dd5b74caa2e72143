//! Bounded exponential-backoff retry for transient failures
//!
//! Used for external-service calls (scraping, transcription, storage)
//! and transient database lock errors. Non-retryable errors fail
//! immediately; retryable errors back off exponentially until the
//! attempt budget is spent.

use std::time::Duration;

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

/// Retry `operation` until it succeeds, fails non-retryably, or the
/// attempt budget is spent
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff_ms = policy.initial_backoff_ms;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) || attempt == policy.max_attempts {
                    if attempt > 1 {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Operation failed, retries exhausted"
                        );
                    }
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Operation failed, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(policy.max_backoff_ms);
            }
        }
    }

    unreachable!("retry loop returns on final attempt")
}
