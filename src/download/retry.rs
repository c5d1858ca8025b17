//! Backoff for storefront and CDN requests that fail transiently.
//!
//! Errors are sorted into a [`FailureType`]. Only transient failures and
//! rate limiting are retried; a rejected session or a missing file is final.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::DownloadError;

/// Retries after the first attempt unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const FIRST_DELAY: Duration = Duration::from_secs(1);
const DELAY_CEILING: Duration = Duration::from_secs(32);
const MAX_JITTER: Duration = Duration::from_millis(500);

/// How a failed request should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Network trouble or a 5xx the CDN emits under load.
    Transient,
    /// HTTP 429.
    RateLimited,
    /// 401/403; the session is not accepted.
    NeedsAuth,
    /// Retrying would give the same answer.
    Permanent,
}

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        delay: Duration,
        /// Number of the attempt about to be made (the first retry is 2).
        attempt: u32,
    },
    DoNotRetry {
        reason: String,
    },
}

/// Attempt budget and doubling backoff.
///
/// The wait before retry `n` is `min(first_delay * 2^(n-1), ceiling)` plus up
/// to half a second of jitter, never more jitter than `first_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    first_delay: Duration,
    ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Allows `max_retries` retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            first_delay: FIRST_DELAY,
            ceiling: DELAY_CEILING,
        }
    }

    /// A single attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_retries(0)
    }

    /// Replaces the backoff delays, keeping the attempt budget.
    #[must_use]
    pub fn with_delays(mut self, first_delay: Duration, ceiling: Duration) -> Self {
        self.first_delay = first_delay;
        self.ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what happens after attempt number `attempt` (1-based) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure: FailureType, attempt: u32) -> RetryDecision {
        let reason = match failure {
            FailureType::Permanent => Some("failure is permanent".to_string()),
            FailureType::NeedsAuth => Some("session was rejected".to_string()),
            FailureType::Transient | FailureType::RateLimited if attempt >= self.max_attempts => {
                debug!(attempt, "attempt budget spent");
                Some(format!("all {} attempts used", self.max_attempts))
            }
            FailureType::Transient | FailureType::RateLimited => None,
        };
        match reason {
            Some(reason) => RetryDecision::DoNotRetry { reason },
            None => RetryDecision::Retry {
                delay: self.delay_before(attempt + 1),
                attempt: attempt + 1,
            },
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(2).min(16);
        let backoff = self
            .first_delay
            .saturating_mul(1 << doublings)
            .min(self.ceiling);
        backoff + self.jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn jitter(&self) -> Duration {
        let ceiling = MAX_JITTER.min(self.first_delay).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Sorts a request error for [`RetryPolicy::should_retry`].
///
/// TLS failures are permanent; other network errors and timeouts are not.
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_status(*status),
        DownloadError::AuthRequired { .. } => FailureType::NeedsAuth,
        DownloadError::Timeout { .. } => FailureType::Transient,
        DownloadError::Network { source, .. } if looks_like_tls(source) => FailureType::Permanent,
        DownloadError::Network { .. } => FailureType::Transient,
        DownloadError::Io { .. }
        | DownloadError::Decode { .. }
        | DownloadError::Config { .. }
        | DownloadError::Cancelled { .. } => FailureType::Permanent,
    }
}

/// True for 429 and the 5xx statuses worth another try.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(
        classify_status(status),
        FailureType::Transient | FailureType::RateLimited
    )
}

fn classify_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::NeedsAuth,
        429 => FailureType::RateLimited,
        500 | 502 | 503 | 504 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn looks_like_tls(error: &reqwest::Error) -> bool {
    let text = error.to_string().to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| text.contains(needle))
}
