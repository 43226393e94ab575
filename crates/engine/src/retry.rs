//! Delivery retrier.
//!
//! Wraps outbound sends in bounded retry. Rate limiting is the interesting
//! case: the channel tells us exactly how long to wait, so the retrier
//! sleeps that long (plus a safety margin) without consuming the exponential
//! backoff, which stays reserved for failures with no such hint.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Total attempts per send, the first one included.
pub const MAX_SEND_ATTEMPTS: u32 = 5;

/// First backoff delay; doubles after every non-rate-limited failure.
pub const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Slack added on top of the channel's own retry-after hint.
pub const RATE_LIMIT_MARGIN: Duration = Duration::from_secs(1);

/// How an outbound send failed. Transports map their provider's failure
/// modes onto this; the retrier never inspects provider error text.
#[derive(Debug, Error)]
pub enum SendError {
    /// The channel asked us to slow down and said for how long.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Any other delivery failure (transport, API rejection).
    #[error("send failed: {0}")]
    Failed(String),
}

/// Run `op` until it succeeds or the attempt cap is spent.
///
/// `op` is re-invoked for every attempt. The final error is returned
/// unchanged once `MAX_SEND_ATTEMPTS` attempts have failed.
pub async fn send_with_retry<T, F, Fut>(mut op: F) -> Result<T, SendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SendError>>,
{
    let mut backoff = BASE_BACKOFF;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= MAX_SEND_ATTEMPTS {
            tracing::error!(attempts = attempt, error = %err, "Send failed, attempts exhausted");
            return Err(err);
        }

        match err {
            SendError::RateLimited { retry_after } => {
                let wait = retry_after + RATE_LIMIT_MARGIN;
                tracing::warn!(attempt, wait_ms = wait.as_millis() as u64, "Send rate limited, waiting");
                tokio::time::sleep(wait).await;
            }
            SendError::Failed(reason) => {
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %reason,
                    "Send failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn failing_for<T: Clone + Send + 'static>(
        failures: u32,
        err: impl Fn() -> SendError + Send + Sync + 'static,
        value: T,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<T, SendError>> + Send>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let err = Arc::new(err);
        let op = move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            let err = err.clone();
            Box::pin(async move {
                if n < failures {
                    Err(err())
                } else {
                    Ok(value)
                }
            }) as std::pin::Pin<Box<dyn Future<Output = Result<T, SendError>> + Send>>
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_does_not_sleep() {
        let start = Instant::now();
        let (calls, op) = failing_for(0, || SendError::Failed("boom".into()), 7i64);

        let result = send_with_retry(op).await.unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_plain_failures() {
        let start = Instant::now();
        let (calls, op) = failing_for(2, || SendError::Failed("boom".into()), ());

        send_with_retry(op).await.unwrap();

        // 500ms after attempt 1, 1000ms after attempt 2.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_hint_plus_margin() {
        let start = Instant::now();
        let (calls, op) = failing_for(
            1,
            || SendError::RateLimited {
                retry_after: Duration::from_secs(7),
            },
            (),
        );

        send_with_retry(op).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_does_not_consume_backoff() {
        // Failure, rate limit, failure: the second plain failure still only
        // gets the second backoff step, not the third.
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let op = move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(SendError::Failed("boom".into())),
                    1 => Err(SendError::RateLimited {
                        retry_after: Duration::from_secs(3),
                    }),
                    2 => Err(SendError::Failed("boom again".into())),
                    _ => Ok(()),
                }
            }
        };

        let start = Instant::now();
        send_with_retry(op).await.unwrap();

        // 500ms + (3s + 1s margin) + 1000ms; the rate-limited wait left the
        // backoff ladder untouched.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(500 + 4000 + 1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let (calls, op) = failing_for(u32::MAX, || SendError::Failed("down".into()), ());

        let err = send_with_retry(op).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), MAX_SEND_ATTEMPTS);
        assert!(matches!(err, SendError::Failed(_)));
    }
}
