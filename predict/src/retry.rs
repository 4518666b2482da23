//! Retry policy for prediction requests.
//!
//! Retrying is an explicit opt-in. The default policy, [`RetryPolicy::Never`],
//! sends exactly one request and hands any failure straight back to the
//! operator, who decides whether to resubmit.
//!
//! # Backoff (opt-in)
//!
//! - Only transport failures (connect errors, timeouts) are retried
//! - HTTP error statuses are never retried; the service has already answered
//! - Delay: `initial_delay * 2^step`, capped at `max_delay`
//! - Jitter: down-jitter up to `jitter_factor` (multiplier in `[1 - jitter, 1.0]`)
//!
//! # Headers
//!
//! - `X-Retry-Count`: 0 for the initial attempt, 1+ for retries

use std::time::Duration;

use reqwest::{RequestBuilder, Response};

pub const RETRY_COUNT_HEADER: &str = "X-Retry-Count";

/// Backoff parameters for [`RetryPolicy::Backoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting initial request).
    pub max_retries: u32,
    /// Initial backoff delay before first retry.
    pub initial_delay: Duration,
    /// Maximum backoff delay.
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryPolicy {
    /// Single attempt; failures surface immediately.
    #[default]
    Never,
    /// Retry transport failures with exponential backoff.
    Backoff(RetryConfig),
}

impl RetryPolicy {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::Never => 1,
            RetryPolicy::Backoff(config) => config.max_retries.saturating_add(1),
        }
    }
}

/// Calculate retry delay with exponential backoff and jitter.
///
/// `backoff_step` is 0 before the first retry, 1 before the second, etc.
#[must_use]
pub fn calculate_retry_delay(backoff_step: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Outcome of sending a request under a [`RetryPolicy`].
///
/// Any HTTP response, success or error status, is a `Response`; only a
/// transport failure on the last permitted attempt is a `ConnectionError`.
#[derive(Debug)]
pub enum SendOutcome {
    Response(Response),
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
}

/// Send a request, retrying transport failures only if the policy allows it.
///
/// `build_request` is called once per attempt.
pub async fn send_with_policy<F>(build_request: F, policy: &RetryPolicy) -> SendOutcome
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0u32;

    loop {
        let request = build_request().header(RETRY_COUNT_HEADER, attempt.to_string());
        let err = match request.send().await {
            Ok(response) => return SendOutcome::Response(response),
            Err(err) => err,
        };

        attempt += 1;
        let RetryPolicy::Backoff(config) = policy else {
            return SendOutcome::ConnectionError {
                attempts: attempt,
                source: err,
            };
        };
        if attempt >= max_attempts || !is_retryable_error(&err) {
            return SendOutcome::ConnectionError {
                attempts: attempt,
                source: err,
            };
        }

        let delay = calculate_retry_delay(attempt - 1, config);
        tracing::debug!(
            error = %err,
            retry_count = attempt,
            delay_ms = delay.as_millis(),
            "Retrying prediction request after connection error"
        );
        tokio::time::sleep(delay).await;
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}
