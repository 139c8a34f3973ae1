//! Bounded retry with exponential backoff for archive downloads.

use std::ops::RangeInclusive;
use std::time::Duration;

use dictindex_shared::{DictIndexError, Result, RetryConfig};
use tracing::{debug, warn};

use crate::transport::HttpTransport;

/// Which failures are retried, how often, and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// HTTP statuses treated as transient.
    pub retryable_statuses: Vec<RangeInclusive<u16>>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retryable_statuses: vec![408..=408, 429..=429, 500..=599],
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.iter().any(|r| r.contains(&status))
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// GET `url`, retrying transient failures according to `policy`.
///
/// Transport errors (including timeouts) and statuses in the retryable set
/// are retried; any other non-success status fails immediately.
pub async fn fetch_with_retry<T: HttpTransport + ?Sized>(
    transport: &T,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        debug!(url, attempt, "download attempt");

        match transport.get(url).await {
            Ok(response) if response.is_success() => return Ok(response.body),
            Ok(response) if policy.is_retryable(response.status) => {
                last_error = format!("HTTP {}", response.status);
            }
            Ok(response) => {
                return Err(DictIndexError::Acquisition(format!(
                    "{url}: HTTP {}",
                    response.status
                )));
            }
            Err(e) => last_error = e.to_string(),
        }

        if attempt < attempts {
            let delay = policy.delay_for(attempt);
            warn!(
                url,
                attempt,
                error = %last_error,
                retry_in_ms = delay.as_millis(),
                "download failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(DictIndexError::Acquisition(format!(
        "{url}: giving up after {attempts} attempts: {last_error}"
    )))
}
