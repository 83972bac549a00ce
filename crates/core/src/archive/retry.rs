//! Retry loop with a quadratic backoff schedule.

use reqwest::Url;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics::DOWNLOAD_ATTEMPTS;

use super::error::FetchError;
use super::fetcher::Fetcher;

/// Attempts per file, including the first one.
pub const MAX_ATTEMPTS: u32 = 3;

/// Fixed-count retry with a quadratic delay.
///
/// Before attempt `i` (0-based) the policy waits `i * i` units, so three
/// attempts wait 0, 1 and 4 units.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(unit: Duration) -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            unit,
        }
    }

    /// Delay to wait before the 0-based `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Run `fetcher` until it succeeds, a non-retryable error occurs, or
    /// attempts run out.
    pub async fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        url: &Url,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }

            match fetcher.fetch(url, dest).await {
                Ok(bytes) => {
                    DOWNLOAD_ATTEMPTS.with_label_values(&["success"]).inc();
                    return Ok(bytes);
                }
                Err(e) if e.is_retryable() => {
                    DOWNLOAD_ATTEMPTS.with_label_values(&["retryable"]).inc();
                    warn!(url = %url, attempt = attempt + 1, error = %e, "Download attempt failed");
                    last_error = Some(e);
                }
                Err(e) => {
                    DOWNLOAD_ATTEMPTS.with_label_values(&["fatal"]).inc();
                    return Err(e);
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts: self.max_attempts,
            last: Box::new(
                last_error.unwrap_or_else(|| FetchError::Request("no attempts made".to_string())),
            ),
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
