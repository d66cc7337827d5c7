//! Request Guard
//!
//! Checks shared by every signed licensing endpoint, in order: rate
//! limit per source address, request signature for the endpoint's
//! operation, replay window, then key checksum. Returns the verified key fields or the first rejection.

use chrono::{DateTime, Utc};
use keycodec::signature::within_replay_window;
use keycodec::{KeyError, KeyFields, Operation, RejectionReason, ValidateRequest, redact_key};
use platform::client::source_key;
use platform::rate_limit::RateLimitStore;
use std::net::IpAddr;
use std::sync::Arc;

use crate::application::config::LicensingConfig;
use crate::error::LicensingResult;

/// Protocol decision: `Err` is a rejection answered with a normal response
pub type Verdict<T> = Result<T, RejectionReason>;

pub struct RequestGuard<Q>
where
    Q: RateLimitStore,
{
    rate_limiter: Arc<Q>,
    config: Arc<LicensingConfig>,
}

impl<Q> RequestGuard<Q>
where
    Q: RateLimitStore,
{
    pub fn new(rate_limiter: Arc<Q>, config: Arc<LicensingConfig>) -> Self {
        Self {
            rate_limiter,
            config,
        }
    }

    pub async fn check(
        &self,
        operation: Operation,
        request: &ValidateRequest,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> LicensingResult<Verdict<KeyFields>> {
        let limit = self
            .rate_limiter
            .check_and_increment(
                &source_key(source_ip),
                &self.config.rate_limit(),
                now.timestamp_millis(),
            )
            .await?;
        if !limit.allowed {
            tracing::warn!(
                source_ip = ?source_ip,
                reset_at_ms = limit.reset_at_ms,
                "Licensing rate limit exceeded"
            );
            return Ok(Err(RejectionReason::RateLimited));
        }

        if !request.has_valid_signature(operation, self.config.client_secret.expose()) {
            return Ok(Err(RejectionReason::InvalidSignature));
        }

        if !within_replay_window(
            request.timestamp,
            now.timestamp(),
            self.config.replay_window_secs(),
        ) {
            tracing::warn!(
                license_key = %redact_key(&request.key),
                skew_secs = now.timestamp() - request.timestamp,
                "Stale licensing request"
            );
            return Ok(Err(RejectionReason::StaleRequest));
        }

        Ok(
            keycodec::verify(&request.key, self.config.key_secret.expose()).map_err(|e| match e {
                KeyError::TamperedKey => RejectionReason::TamperedKey,
                _ => RejectionReason::MalformedKey,
            }),
        )
    }
}
