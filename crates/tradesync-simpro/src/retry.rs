//! Retry with exponential back-off and jitter for the Simpro client.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx, 429). Permanent errors are
//! returned immediately so deletion validation can read a 404 without burning
//! retry budget.

use std::future::Future;
use std::time::Duration;

use crate::error::SimproError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses and 429 rate limiting.
///
/// **Not retriable (hard stop):**
/// - [`SimproError::NotFound`]: the resource is gone; retrying won't revive it.
/// - [`SimproError::Api`] with a 4xx status: caller error.
/// - [`SimproError::Deserialize`]: malformed response; retrying won't fix it.
pub(crate) fn is_retriable(err: &SimproError) -> bool {
    match err {
        SimproError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        SimproError::Api { status, .. } => *status >= 500 || *status == 429,
        SimproError::NotFound { .. }
        | SimproError::Deserialize { .. }
        | SimproError::InvalidUrl(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Delay doubles each attempt from `backoff_base_ms`, with ±25 % jitter,
/// capped at 60 s. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SimproError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SimproError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Simpro transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deserialize_err() -> SimproError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        SimproError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    #[test]
    fn not_found_is_not_retriable() {
        assert!(!is_retriable(&SimproError::NotFound {
            context: "schedules/42".to_owned()
        }));
    }

    #[test]
    fn client_error_is_not_retriable() {
        assert!(!is_retriable(&SimproError::Api {
            status: 400,
            message: "bad filter".to_owned()
        }));
    }

    #[test]
    fn server_error_is_retriable() {
        assert!(is_retriable(&SimproError::Api {
            status: 503,
            message: "unavailable".to_owned()
        }));
    }

    #[test]
    fn rate_limit_is_retriable() {
        assert!(is_retriable(&SimproError::Api {
            status: 429,
            message: "slow down".to_owned()
        }));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err()));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, SimproError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SimproError::NotFound {
                    context: "schedules/9".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "NotFound must not be retried"
        );
        assert!(matches!(result, Err(SimproError::NotFound { .. })));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(SimproError::Api {
                        status: 502,
                        message: "bad gateway".to_owned(),
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99, "should succeed after retries");
        assert_eq!(
            calls.load(Ordering::SeqCst),
            3,
            "should have been called 3 times (2 failures + 1 success)"
        );
    }

    #[tokio::test]
    async fn exhausts_retry_budget() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SimproError::Api {
                    status: 500,
                    message: "boom".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 try + 2 retries");
        assert!(matches!(result, Err(SimproError::Api { status: 500, .. })));
    }
}
