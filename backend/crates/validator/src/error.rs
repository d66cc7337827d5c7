//! Client validator errors

use keycodec::RejectionReason;
use thiserror::Error;

pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Failure to reach a decision from the validation service.
///
/// Always transient: callers fall back to the cached entitlement.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("rate limited by validation service")]
    RateLimited,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("local state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation service unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("request rejected: {0}")]
    Rejected(RejectionReason),

    #[error("invalid configuration: {0}")]
    Config(String),
}
