use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::Config;
use crate::integrations::http::ProviderError;

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_DELAYS_MS: [u64; 3] = [750, 1_500, 3_000];

/// Bounded retry with a fixed, escalating delay schedule.
///
/// Attempts against one endpoint run strictly in sequence; the caller moves
/// on to its next fallback once the policy gives up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_DELAYS_MS.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.retry_max_attempts,
            config
                .retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }

    /// Policy that never waits between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Vec::new())
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before retry number `retry` (zero based). The last configured
    /// delay repeats once the schedule runs out.
    pub fn delay_for(&self, retry: usize) -> Duration {
        self.delays
            .get(retry)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt - 1);
                    tracing::debug!(
                        "{} retryable failure (attempt {}/{}), waiting {}ms: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        delay.as_millis(),
                        err
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }

    /// [`RetryPolicy::run`] with the provider rate-limit predicate.
    pub async fn run_provider<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.run(label, operation, ProviderError::is_retryable).await
    }
}
