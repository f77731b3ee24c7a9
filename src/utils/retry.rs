use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Exponential backoff: `initial`, doubling per attempt, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub attempts: u32,
    pub initial: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(attempts: u32) -> Self {
        Backoff {
            attempts: attempts.max(1),
            initial: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(self.initial.saturating_mul(factor), self.max_delay)
    }
}

/// Runs `op` until it succeeds, `should_retry` rejects the error, or the
/// attempts are used up. Returns the last error.
pub async fn with_backoff<T, E, F, Fut, R>(backoff: Backoff, mut should_retry: R, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                attempt += 1;
                if attempt >= backoff.attempts || !should_retry(&err) {
                    return Err(err);
                }
                let delay = backoff.delay_for(attempt - 1);
                debug!("attempt {attempt} failed: {err}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
