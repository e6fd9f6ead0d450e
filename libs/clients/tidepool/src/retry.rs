//! Request dispatch with bounded retry.
//!
//! Transport failures and HTTP 503 replies are retried with exponential
//! backoff; every other outcome ends the call. The blocking and async loops
//! differ only in how they wait between attempts.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{TidepoolError, TidepoolResult, TransportError};
use crate::http::{AsyncHttpExecutor, HttpExecutor, HttpRequest, RawResponse};
use crate::parsing::extract_error_message;

/// Suspends the calling thread between blocking attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Why a single attempt should be retried
#[derive(Debug)]
pub(crate) enum AttemptFailure {
    Transport(TransportError),
    Unavailable(TidepoolError),
}

impl From<AttemptFailure> for TidepoolError {
    fn from(failure: AttemptFailure) -> Self {
        match failure {
            AttemptFailure::Transport(err) => TidepoolError::service(err.to_string()),
            AttemptFailure::Unavailable(err) => err,
        }
    }
}

/// Separate retryable outcomes from replies that end the call
pub(crate) fn screen_attempt(
    result: Result<RawResponse, TransportError>,
) -> Result<RawResponse, AttemptFailure> {
    match result {
        Err(err) => Err(AttemptFailure::Transport(err)),
        Ok(response) if response.status == 503 => {
            Err(AttemptFailure::Unavailable(TidepoolError::ServiceUnavailable {
                message: extract_error_message(&response),
                status_code: Some(503),
            }))
        }
        Ok(response) => Ok(response),
    }
}

/// Turn a final reply into its JSON body.
///
/// Error statuses map to the error taxonomy; 204 and empty bodies yield `None`.
pub fn decode_response(response: &RawResponse) -> TidepoolResult<Option<Value>> {
    if response.status >= 400 {
        let message = extract_error_message(response);
        debug!(status = response.status, %message, "request failed");
        return Err(TidepoolError::from_status(response.status, message));
    }
    if response.status == 204 || response.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&response.body)
        .map(Some)
        .map_err(|_| TidepoolError::Service {
            message: "Invalid JSON response".to_string(),
            status_code: Some(response.status),
        })
}

fn deadline_exceeded(deadline: Duration) -> TidepoolError {
    TidepoolError::service(format!("request deadline of {:?} exceeded", deadline))
}

fn log_exhausted(request: &HttpRequest, attempts: u32, failure: &AttemptFailure) {
    warn!(
        method = %request.method,
        path = %request.path,
        attempts,
        error = ?failure,
        "giving up after retries"
    );
}

/// Send `request`, waiting on the calling thread between retries
pub(crate) fn send_blocking<E>(
    executor: &E,
    request: &HttpRequest,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    deadline: Option<Duration>,
) -> TidepoolResult<RawResponse>
where
    E: HttpExecutor + ?Sized,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        let failure = match screen_attempt(executor.execute(request)) {
            Ok(response) => {
                if attempt > 0 {
                    debug!(attempt, "request succeeded after retries");
                }
                return Ok(response);
            }
            Err(failure) => failure,
        };

        if attempt >= policy.max_retries {
            log_exhausted(request, attempt + 1, &failure);
            return Err(failure.into());
        }

        let delay = policy.delay_for(attempt);
        if let Some(deadline) = deadline {
            if started.elapsed() + delay > deadline {
                return Err(deadline_exceeded(deadline));
            }
        }

        debug!(
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = ?failure,
            "transient failure, retrying"
        );
        sleeper.sleep(delay);
        attempt += 1;
    }
}

async fn retry_async<E>(
    executor: &E,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> TidepoolResult<RawResponse>
where
    E: AsyncHttpExecutor + ?Sized,
{
    let mut attempt = 0;

    loop {
        let failure = match screen_attempt(executor.execute(request).await) {
            Ok(response) => {
                if attempt > 0 {
                    debug!(attempt, "request succeeded after retries");
                }
                return Ok(response);
            }
            Err(failure) => failure,
        };

        if attempt >= policy.max_retries {
            log_exhausted(request, attempt + 1, &failure);
            return Err(failure.into());
        }

        let delay = policy.delay_for(attempt);
        debug!(
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = ?failure,
            "transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Send `request`, yielding to the runtime between retries
pub(crate) async fn send_async<E>(
    executor: &E,
    request: &HttpRequest,
    policy: &RetryPolicy,
    deadline: Option<Duration>,
) -> TidepoolResult<RawResponse>
where
    E: AsyncHttpExecutor + ?Sized,
{
    let attempts = retry_async(executor, request, policy);
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, attempts)
            .await
            .map_err(|_| deadline_exceeded(deadline))?,
        None => attempts.await,
    }
}
