use std::future::Future;
use std::time::Duration;

/// Retry policy for remote operations: a fixed attempt budget with
/// exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts with delays of 1s then 2s between them.
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

/// Run `op` until it succeeds or the attempt budget is exhausted, doubling
/// the delay after each failure. The last error is surfaced to the caller.
pub async fn with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts => {
                tracing::warn!(
                    "remote call failed (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                    policy.attempts
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
