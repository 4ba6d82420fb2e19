//! Bounded store calls and whole-round retries.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::traits::StoreResult;
use crate::common::{DispatchError, StoreError};

/// Runs one store call, turning an elapsed deadline into `StoreError::Timeout`.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, after }),
    }
}

/// How often, and how patiently, a failed round is re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Linear backoff step: the n-th retry waits `n * delay`.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(100),
        }
    }
}

/// Re-runs `attempt` while it fails with a retryable error, up to
/// `policy.max_retries` extra times.
///
/// Non-retryable errors (NotFound, Conflict, ...) come back untouched on the
/// first occurrence. An exhausted retry budget comes back as
/// `DispatchError::Transient` carrying the total attempt count.
pub async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, DispatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
{
    let mut retries = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                tracing::warn!(
                    error = %e,
                    operation,
                    retry = retries,
                    max_retries = policy.max_retries,
                    "Transient store failure, retrying..."
                );
                sleep(policy.delay * retries).await;
            }
            Err(e) if e.is_retryable() => {
                let attempts = retries + 1;
                tracing::error!(error = %e, operation, attempts, "Giving up after all retries");
                return Err(match e {
                    DispatchError::Transient { source, .. } | DispatchError::Store(source) => {
                        DispatchError::Transient { attempts, source }
                    }
                    other => other,
                });
            }
            Err(e) => return Err(e),
        }
    }
}
