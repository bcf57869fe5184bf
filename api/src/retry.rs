use std::future::Future;
use std::time::Duration;

/// Run a fallible async operation up to `max_retries` times with pure
/// exponential backoff (`initial_delay * 2^attempt`, no jitter). The final
/// failure is returned as-is; no sleep follows the last attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_retries: u32,
    initial_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt + 1 >= max_retries {
                    return Err(err);
                }
                let delay = initial_delay * 2u32.pow(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::retry_with_backoff;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn returns_first_success_without_retrying() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> =
            retry_with_backoff(3, Duration::from_millis(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry_with_backoff(3, Duration::from_millis(1), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("attempt {n}"))
            })
            .await;
        assert_eq!(result, Err("attempt 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, &str> =
            retry_with_backoff(3, Duration::from_millis(1), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient")
                } else {
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_attempt_never_sleeps() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> =
            retry_with_backoff(1, Duration::from_secs(3600), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal")
            })
            .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
