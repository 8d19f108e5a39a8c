//! Shared plumbing for the HTTP capability backends.
//!
//! Provides the common error type, the blocking `reqwest` client factory, and
//! retry handling with exponential backoff.
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to a capability backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Backend-specific errors such as malformed responses
    #[error("backend API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// Classifies a `reqwest` error as a timeout or a generic network error.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            BackendError::Timeout(error)
        } else {
            BackendError::Network(error)
        }
    }

    pub(crate) fn api(message: impl Into<String>) -> Self {
        BackendError::Api {
            message: message.into(),
        }
    }
}

/// Validates `url` and builds a blocking HTTP client with the given request timeout.
pub(crate) fn http_client(
    url: &str,
    timeout: Duration,
) -> Result<reqwest::blocking::Client, BackendError> {
    reqwest::Url::parse(url).map_err(|e| BackendError::InvalidUrl(format!("{}: {}", url, e)))?;

    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(BackendError::Network)
}

/// Fails with `BackendError::Http` for any non-success status.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BackendError::Http {
            status: status.as_u16(),
        })
    }
}

/// Delays between attempts of a retried backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Creates a policy sleeping for each of `delays` before the matching retry.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for RetryPolicy {
    /// Three retries after 1s, 2s and 4s.
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }
}

/// Retries an operation with backoff according to `policy`.
///
/// Only transient errors (HTTP 5xx, network errors, timeouts) are retried;
/// the last error is returned once all retries are exhausted.
pub fn retry_with_backoff<F, T>(policy: &RetryPolicy, mut f: F) -> Result<T, BackendError>
where
    F: FnMut() -> Result<T, BackendError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in policy.delays().iter().enumerate() {
        tracing::debug!(attempt = attempt + 1, error = %last_error, "retrying backend call");
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Returns `true` for transient errors worth another attempt.
fn should_retry(error: &BackendError) -> bool {
    match error {
        BackendError::Network(_) => true,
        BackendError::Timeout(_) => true,
        BackendError::Http { status } => (500..600).contains(status),
        BackendError::Serialization(_) => false,
        BackendError::Api { .. } => false,
        BackendError::InvalidUrl(_) => false,
    }
}
