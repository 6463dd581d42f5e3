//! Fixed-delay retry for session establishment.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info};

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
///
/// `op` receives the 1-based attempt number. The last error is returned
/// once every attempt has failed.
pub async fn retry_fixed<T, E, F, Fut>(
    label: &str,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                error!(%label, attempt, error = %e, "attempt failed");
                info!(%label, delay_secs = delay.as_secs(), "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(%label, attempt, error = %e, "final attempt failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_fixed("test", 3, Duration::ZERO, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("boom {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let result: Result<(), String> =
            retry_fixed("test", 3, Duration::ZERO, |attempt| async move {
                Err(format!("boom {attempt}"))
            })
            .await;
        assert_eq!(result, Err("boom 3".to_string()));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), &str> = retry_fixed("test", 0, Duration::ZERO, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), &str> =
            retry_fixed("test", 3, Duration::from_secs(5), |_| async { Err("nope") }).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
