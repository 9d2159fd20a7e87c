use crate::error::AppError;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff settings for usage API calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-indexed), doubling each time
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Run `request_fn` until it succeeds, fails permanently, or attempts run out
///
/// Retryable failures (see [`is_retryable`]) sleep for the backoff delay and
/// try again. Once `max_attempts` is reached the last failure is surfaced as
/// `AppError::TransientApi`. Anything else is returned immediately.
pub async fn execute_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut request_fn: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match request_fn().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if is_retryable(&e) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Giving up after exhausting retry attempts"
                    );
                    return Err(AppError::TransientApi {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Map a transport-level reqwest failure onto the error taxonomy
///
/// Connection failures, timeouts and interrupted bodies are transient.
/// Anything else (for example an invalid URL) becomes a permanent request
/// error whose status is never retried.
pub fn classify_transport_error(err: reqwest::Error) -> AppError {
    if err.is_builder() {
        return AppError::Request {
            status: StatusCode::BAD_REQUEST,
            body: err.to_string(),
        };
    }
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        return AppError::Unavailable(err.to_string());
    }
    AppError::Request {
        status: err
            .status()
            .filter(|status| !is_retryable_status(*status))
            .unwrap_or(StatusCode::BAD_REQUEST),
        body: err.to_string(),
    }
}

/// Whether a status code should be retried (5xx and 429)
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Determine if an error is worth another attempt
///
/// ## Retryable (returns true):
/// - Connection failures and request timeouts
/// - HTTP 5xx and 429 responses
///
/// ## NOT retryable (returns false):
/// - Authentication failures (401, 403, missing key)
/// - Other HTTP 4xx responses
/// - Everything outside the usage API
pub fn is_retryable(error: &AppError) -> bool {
    match error {
        AppError::Unavailable(_) => true,
        AppError::Request { status, .. } => is_retryable_status(*status),

        AppError::Authentication(_) => false,
        AppError::TransientApi { .. } => false,
        AppError::Configuration { .. } => false,
        AppError::Render(_) => false,
        AppError::Delivery(_) => false,
        AppError::Io(_) => false,
    }
}
