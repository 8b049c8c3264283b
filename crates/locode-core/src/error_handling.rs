//! Classification of backend failures so callers can decide whether to retry.

use std::time::Duration;
use thiserror::Error;

/// Returned by a turn that was interrupted before it finished.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Turn cancelled by user")]
pub struct TurnCancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverableError {
    /// The backend stopped responding within the request timeout.
    Timeout,
    /// Nothing is listening at the configured address.
    ConnectionRefused,
    /// 5xx from the backend, usually a model that is still loading.
    ServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Recoverable(RecoverableError),
    NonRecoverable,
}

pub fn classify_error(error: &anyhow::Error) -> ErrorType {
    if error.is::<TurnCancelled>() {
        return ErrorType::NonRecoverable;
    }

    // Include the whole cause chain; reqwest hides the interesting part in sources
    let message = format!("{:#}", error).to_lowercase();

    if message.contains("timed out") || message.contains("timeout") {
        ErrorType::Recoverable(RecoverableError::Timeout)
    } else if message.contains("connection refused")
        || message.contains("could not connect")
        || message.contains("error sending request")
        || message.contains("tcp connect error")
    {
        ErrorType::Recoverable(RecoverableError::ConnectionRefused)
    } else if message.contains("api error 5")
        || message.contains("internal server error")
        || message.contains("service unavailable")
        || message.contains("bad gateway")
    {
        ErrorType::Recoverable(RecoverableError::ServerError)
    } else {
        ErrorType::NonRecoverable
    }
}

/// Exponential backoff: 1s, 2s, 4s, ... capped at 30s.
pub fn calculate_retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(5);
    Duration::from_millis((1000 * 2_u64.pow(exponent)).min(30_000))
}
