//! Deactivate Instance Use Case
//!
//! Frees a seat so another installation can activate. The body has the
//! validation shape but must be signed for the deactivate operation;
//! license status and expiry do not matter.

use chrono::{DateTime, Utc};
use keycodec::{DeactivateResponse, Operation, RejectionReason, ValidateRequest, redact_key};
use platform::rate_limit::RateLimitStore;
use std::net::IpAddr;
use std::sync::Arc;

use crate::application::config::LicensingConfig;
use crate::application::request_guard::{RequestGuard, Verdict};
use crate::application::validate_license::ValidateLicenseInput;
use crate::domain::entities::ValidationLogEntry;
use crate::domain::repository::LicensingRepository;
use crate::domain::value_objects::ValidationOutcome;
use crate::error::LicensingResult;

pub struct DeactivateInstanceUseCase<R, Q>
where
    R: LicensingRepository,
    Q: RateLimitStore,
{
    repo: Arc<R>,
    guard: RequestGuard<Q>,
    config: Arc<LicensingConfig>,
}

impl<R, Q> DeactivateInstanceUseCase<R, Q>
where
    R: LicensingRepository,
    Q: RateLimitStore,
{
    pub fn new(repo: Arc<R>, rate_limiter: Arc<Q>, config: Arc<LicensingConfig>) -> Self {
        Self {
            repo,
            guard: RequestGuard::new(rate_limiter, config.clone()),
            config,
        }
    }

    pub async fn execute(
        &self,
        input: ValidateLicenseInput,
        now: DateTime<Utc>,
    ) -> LicensingResult<DeactivateResponse> {
        let ValidateLicenseInput { request, source_ip } = input;

        let verdict = self.decide(&request, source_ip, now).await?;
        let outcome = match verdict {
            Ok(_) => ValidationOutcome::Deactivated,
            Err(reason) => ValidationOutcome::Rejected(reason),
        };
        self.repo
            .append_log(&ValidationLogEntry::new(&request, outcome, source_ip, now))
            .await?;

        match verdict {
            Ok(deactivated) => {
                tracing::info!(
                    license_key = %redact_key(&request.key),
                    instance_id = %request.instance_id,
                    deactivated,
                    "Instance deactivation"
                );
                Ok(DeactivateResponse {
                    deactivated,
                    reason: None,
                })
            }
            Err(reason) => {
                tracing::warn!(
                    license_key = %redact_key(&request.key),
                    instance_id = %request.instance_id,
                    reason = %reason,
                    "Instance deactivation rejected"
                );
                Ok(DeactivateResponse {
                    deactivated: false,
                    reason: Some(reason),
                })
            }
        }
    }

    async fn decide(
        &self,
        request: &ValidateRequest,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> LicensingResult<Verdict<bool>> {
        let verdict = self
            .guard
            .check(Operation::Deactivate, request, source_ip, now)
            .await?;
        let fields = match verdict {
            Ok(fields) => fields,
            Err(reason) => return Ok(Err(reason)),
        };

        let key = fields.encode(self.config.key_secret.expose());
        if self.repo.get_license(&key).await?.is_none() {
            return Ok(Err(RejectionReason::LicenseNotFound));
        }

        let removed = self
            .repo
            .deactivate_instance(&key, &request.instance_id)
            .await?;
        Ok(Ok(removed))
    }
}
