//! Key codec error types

use thiserror::Error;

pub type KeyResult<T> = Result<T, KeyError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Segment count or a segment's character class is wrong
    #[error("malformed license key: {0}")]
    MalformedKey(String),

    /// Checksum does not match the payload under this secret
    #[error("license key checksum mismatch")]
    TamperedKey,

    /// Organization normalizes to an empty string
    #[error("organization must contain at least one ASCII letter or digit")]
    InvalidOrganization,

    /// Seat counts below the unlimited sentinel
    #[error("invalid seat count {0}: must be -1, 0 or positive")]
    InvalidSeats(i32),
}

impl KeyError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        KeyError::MalformedKey(detail.into())
    }
}
