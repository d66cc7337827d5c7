//! Licensing Error Types
//!
//! Protocol rejections (`RejectionReason`) are not errors: they are
//! answered with a normal response. `LicensingError` covers failures that
//! prevent reaching a decision, plus admin-side misuse.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use keycodec::KeyError;
use platform::rate_limit::RateLimitError;
use thiserror::Error;

/// Licensing result type alias
pub type LicensingResult<T> = Result<T, LicensingError>;

#[derive(Debug, Error)]
pub enum LicensingError {
    #[error("License not found")]
    LicenseNotFound,

    #[error("License already exists")]
    LicenseExists,

    /// Key failed to decode or verify when issuing
    #[error("Invalid license key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LicensingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LicensingError::LicenseNotFound => ErrorKind::NotFound,
            LicensingError::LicenseExists => ErrorKind::Conflict,
            LicensingError::InvalidKey(_) => ErrorKind::UnprocessableEntity,
            LicensingError::RateLimit(_) => ErrorKind::ServiceUnavailable,
            LicensingError::Database(_) | LicensingError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn log(&self) {
        match self {
            LicensingError::Database(e) => {
                tracing::error!(error = %e, "Licensing database error");
            }
            LicensingError::RateLimit(e) => {
                tracing::error!(error = %e, "Rate limit backend error");
            }
            LicensingError::Internal(msg) => {
                tracing::error!(message = %msg, "Licensing internal error");
            }
            _ => {
                tracing::debug!(error = %self, "Licensing error");
            }
        }
    }
}

impl From<LicensingError> for AppError {
    fn from(err: LicensingError) -> Self {
        match err {
            // Keeps the sqlx-specific mapping (serialization failures are 503)
            LicensingError::Database(e) => AppError::from(e),
            LicensingError::RateLimit(e) => {
                AppError::service_unavailable("Rate limiter unavailable").with_source(e)
            }
            LicensingError::Internal(_) => AppError::internal("Internal error"),
            other => AppError::new(other.kind(), other.to_string()),
        }
    }
}

impl IntoResponse for LicensingError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(LicensingError::LicenseNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(LicensingError::LicenseExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            LicensingError::InvalidKey(KeyError::TamperedKey).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_database_error_maps_through_kernel() {
        let app: AppError = LicensingError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(app.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let app: AppError = LicensingError::Internal("secret detail".into()).into();
        assert_eq!(app.kind(), ErrorKind::InternalServerError);
        assert!(!app.message().contains("secret"));
    }
}
