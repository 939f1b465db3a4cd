//! Retry of whole transactions on optimistic-concurrency conflicts.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::EngineError;

/// Upper bound for a single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Backoff policy for transactions that lost a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRetryPolicy {
    /// Total attempts including the first one. 1 disables retry.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for TransactionRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10,
            multiplier: 2.0,
        }
    }
}

impl TransactionRetryPolicy {
    /// No retry at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retrying after `attempts` failed attempts (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1), capped at
    /// [`MAX_RETRY_DELAY`].
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = Duration::from_millis(self.base_delay_ms).as_secs_f64();
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Each call of `op` must open, use and commit its own transaction so that a
/// retry starts from a fresh snapshot.
pub async fn with_retry<T, F, Fut>(
    policy: &TransactionRetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.next_delay(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transaction conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> TransactionRetryPolicy {
        TransactionRetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            multiplier: 1.0,
        }
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = TransactionRetryPolicy::default();
        assert_eq!(policy.next_delay(1), Duration::from_millis(10));
        assert_eq!(policy.next_delay(2), Duration::from_millis(20));
        assert_eq!(policy.next_delay(3), Duration::from_millis(40));
    }

    #[test]
    fn zero_attempts_uses_base_delay() {
        let policy = TransactionRetryPolicy::default();
        assert_eq!(policy.next_delay(0), Duration::from_millis(10));
    }

    #[test]
    fn huge_backoff_is_capped() {
        let policy = TransactionRetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
            multiplier: 1e308,
        };
        assert_eq!(policy.next_delay(2), MAX_RETRY_DELAY);
        assert_eq!(policy.next_delay(u32::MAX), MAX_RETRY_DELAY);

        let slow_base = TransactionRetryPolicy {
            base_delay_ms: u64::MAX,
            ..TransactionRetryPolicy::default()
        };
        assert_eq!(slow_base.next_delay(1), MAX_RETRY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_multiplier_still_retries() {
        let policy = TransactionRetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
            multiplier: 1e308,
        };
        let calls = &AtomicU32::new(0);
        let result = with_retry(&policy, "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EngineError::Store(StoreError::Conflict("busy".into())))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EngineError::Store(StoreError::Conflict("busy".into())))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Store(StoreError::Conflict("busy".into())))
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::InvalidArgument("bad".into()))
        })
        .await;

        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
