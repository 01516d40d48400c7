//! Rate-limit retry for remote operations.
//!
//! Rate limits are treated as always recoverable: a rate-limited call is
//! retried for as long as it takes. Every other error is returned to the
//! caller on the first occurrence.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{PlatformError, PlatformResult};

/// PagerDuty does not tell us how long to back off.
pub const PAGERDUTY_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Used when Slack omits `Retry-After` on a 429.
pub const SLACK_FALLBACK_WAIT: Duration = Duration::from_secs(30);

/// How the wait before the next attempt is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the same amount.
    Fixed(Duration),
    /// Use the server's `Retry-After`, or `fallback` if it sent none.
    ProviderSupplied { fallback: Duration },
}

/// Retry policy for one remote API.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }

    /// Policy for the scheduling source: one minute between attempts.
    #[must_use]
    pub fn pagerduty() -> Self {
        Self::new(Backoff::Fixed(PAGERDUTY_RATE_LIMIT_WAIT))
    }

    /// Policy for the chat platform: honour `Retry-After`.
    #[must_use]
    pub fn slack() -> Self {
        Self::new(Backoff::ProviderSupplied {
            fallback: SLACK_FALLBACK_WAIT,
        })
    }

    /// Wait before retrying after `error`.
    #[must_use]
    pub fn delay_for(&self, error: &PlatformError) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::ProviderSupplied { fallback } => error.retry_after().unwrap_or(fallback),
        }
    }

    /// Execute an async operation, retrying on rate limits.
    ///
    /// The wait between attempts races `cancel`. Once the token is cancelled
    /// no further attempt is made and the last rate-limit error is returned.
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        operation_name: &str,
        mut f: F,
    ) -> PlatformResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after rate limiting"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if error.is_rate_limited() => {
                    if cancel.is_cancelled() {
                        return Err(error);
                    }

                    let delay = self.delay_for(&error);
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "Rate limit hit, waiting before retry"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            debug!(operation = operation_name, "Cancelled while waiting out rate limit");
                            return Err(error);
                        }
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
