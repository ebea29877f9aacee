//! Bounded retry with linear backoff and jitter for collaborator calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::errors::ProviderError;

pub const MAX_ATTEMPTS: u32 = 4;
const BASE_DELAY_MS: u64 = 600;

/// Run `task` up to [`MAX_ATTEMPTS`] times. Only retryable errors are
/// retried; the delay before attempt n+1 is `600ms * n` plus a random jitter
/// in `[0, max(200, 0.4 * delay)]` ms. Exhaustion returns the last error.
pub async fn with_retry<T, F, Fut>(provider: &str, mut task: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match task().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.retryable || attempt == MAX_ATTEMPTS {
                    return Err(err);
                }
                let base = BASE_DELAY_MS * attempt as u64;
                let jitter_cap = ((base as f64) * 0.4).max(200.0) as u64;
                let jitter = rand::rng().random_range(0..=jitter_cap);
                warn!(
                    provider,
                    attempt, "transient failure, retrying in {}ms: {}", base + jitter, err
                );
                tokio::time::sleep(Duration::from_millis(base + jitter)).await;
            }
        }
    }
    unreachable!("retry loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ProviderError {
        ProviderError::new(ErrorKind::RateLimit, "429")
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_retry("linkedin", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 { Err(transient()) } else { Ok(n) }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("linkedin", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("linkedin", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::fatal(ErrorKind::Auth, "bad key")) }
        })
        .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Auth);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
