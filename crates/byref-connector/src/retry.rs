use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConnectorResult;

/// Bounded exponential backoff for transient connector failures.
///
/// The delay before attempt `n` is `initial_backoff * 2^(n-1)`, capped at
/// `max_backoff`, plus up to 50% random jitter so that many clients
/// retrying against the same backend do not synchronize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff delay after the given zero-based failed attempt.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_backoff);
        // Up to 50% jitter.
        let jitter_ms = if exp.as_millis() > 0 {
            rand::random::<u64>() % (exp.as_millis() as u64 / 2 + 1)
        } else {
            0
        };
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Non-transient errors (missing object, corrupt payload, plain I/O
/// failure) return immediately; transient errors are retried until the
/// attempt budget is spent, then the last error is returned.
pub fn with_retry<T, F>(policy: &RetryPolicy, op_name: &str, mut op: F) -> ConnectorResult<T>
where
    F: FnMut() -> ConnectorResult<T>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient connector failure, retrying"
                );
                std::thread::sleep(delay);
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    // Unreachable unless attempts == 0 was clamped; keep the last error.
    Err(last_err.unwrap_or_else(|| {
        crate::error::ConnectorError::Unavailable("retry loop produced no result".into())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    #[test]
    fn succeeds_first_try_with_one_call() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_twice_then_succeed_makes_three_calls() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ConnectorError::Unavailable("connection refused".into()))
            } else {
                Ok("stored")
            }
        });
        assert_eq!(result.unwrap(), "stored");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn non_transient_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: ConnectorResult<()> = with_retry(&fast_policy(5), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ConnectorError::NotFound(byref_types::ObjectId::random()))
        });
        assert!(matches!(result, Err(ConnectorError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);
        let result: ConnectorResult<()> = with_retry(&fast_policy(3), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ConnectorError::Timeout { seconds: 1 })
        });
        assert!(matches!(result, Err(ConnectorError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(0), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
        };
        // 100ms * 2^6 far exceeds the cap; jitter adds at most 50%.
        let delay = policy.backoff(6);
        assert!(delay <= Duration::from_millis(375));
    }

    #[test]
    fn policy_serde_roundtrip() {
        let policy = RetryPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: RetryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, parsed);
    }
}
