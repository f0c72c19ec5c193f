use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;

/// First-retry delay. Doubles on every further attempt.
pub(crate) const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Runs `op` up to `attempts` times, sleeping with exponential backoff
/// between failures. Returns the last error when all attempts fail.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    debug_assert!(attempts > 0);
    let mut delay = base;
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::debug!("attempt {attempt}/{attempts} failed: {err}");
                last_err = Some(err);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(last_err.expect("at least one attempt ran"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(3, Duration::from_millis(10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::Status(503))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(2, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Status(500)) }
        })
        .await;
        assert!(matches!(result, Err(FetchError::Status(500))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
