//! Failure classification and bounded retry for external services.
//!
//! Every embedding or generation call returns `Result<T, ServiceError>`.
//! Only [`ServiceError::Transient`] is retried:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → transient
//! - connection errors and timeouts → transient
//! - other HTTP 4xx → permanent, fail immediately
//! - malformed response bodies → permanent
//!
//! Backoff doubles from the configured base: 1s, 2s, 4s, 8s, 16s, 32s for a
//! 1s base (the exponent is capped at 5).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Rate limiting, server errors, and network trouble. Safe to retry.
    #[error("transient service failure: {0}")]
    Transient(String),
    /// Anything retrying cannot fix (bad request, bad credentials, bad payload).
    #[error("service failure: {0}")]
    Permanent(String),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

/// Map a non-success HTTP status to a failure kind.
pub fn classify_status(service: &str, status: reqwest::StatusCode, body: &str) -> ServiceError {
    let message = format!("{} API error {}: {}", service, status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        ServiceError::Transient(message)
    } else {
        ServiceError::Permanent(message)
    }
}

/// Map a transport-level `reqwest` error to a failure kind.
pub fn classify_transport(service: &str, err: &reqwest::Error) -> ServiceError {
    if err.is_decode() || err.is_builder() {
        ServiceError::Permanent(format!("{} request failed: {}", service, err))
    } else {
        ServiceError::Transient(format!("{} connection error: {}", service, err))
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_ms: u64) -> Self {
        Self {
            max_retries,
            base: Duration::from_millis(base_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * (1u32 << (attempt.saturating_sub(1)).min(5))
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// Each attempt calls `op` again from scratch; nothing from a failed
    /// attempt is kept.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        target: "clauselens::retry",
                        %label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
