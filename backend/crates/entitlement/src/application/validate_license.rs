//! Validate License Use Case

use chrono::{DateTime, Utc};
use keycodec::{
    KeyFields, Operation, RejectionReason, ValidateRequest, ValidateResponse, redact_key,
};
use platform::rate_limit::RateLimitStore;
use std::net::IpAddr;
use std::sync::Arc;

use crate::application::config::LicensingConfig;
use crate::application::request_guard::{RequestGuard, Verdict};
use crate::domain::entities::{License, ValidationLogEntry};
use crate::domain::repository::LicensingRepository;
use crate::domain::services::check_license;
use crate::domain::value_objects::{InstanceDecision, ValidationOutcome};
use crate::error::{LicensingError, LicensingResult};

#[derive(Debug, Clone)]
pub struct ValidateLicenseInput {
    pub request: ValidateRequest,
    pub source_ip: Option<IpAddr>,
}

pub struct ValidateLicenseUseCase<R, Q>
where
    R: LicensingRepository,
    Q: RateLimitStore,
{
    repo: Arc<R>,
    guard: RequestGuard<Q>,
    config: Arc<LicensingConfig>,
}

impl<R, Q> ValidateLicenseUseCase<R, Q>
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

    /// Decide, append the decision to the validation log, then answer.
    ///
    /// Every decision is logged, including rate limiting. Store failures
    /// are returned as errors and produce no decision.
    pub async fn execute(
        &self,
        input: ValidateLicenseInput,
        now: DateTime<Utc>,
    ) -> LicensingResult<ValidateResponse> {
        let ValidateLicenseInput { request, source_ip } = input;

        let verdict = self.decide(&request, source_ip, now).await?;
        let outcome = match &verdict {
            Ok(_) => ValidationOutcome::Accepted,
            Err(reason) => ValidationOutcome::Rejected(*reason),
        };

        self.repo
            .append_log(&ValidationLogEntry::new(&request, outcome, source_ip, now))
            .await?;

        match verdict {
            Ok(license) => {
                tracing::info!(
                    license_key = %redact_key(&license.key),
                    instance_id = %request.instance_id,
                    client_version = %request.version,
                    tier = %license.tier,
                    "License validated"
                );
                Ok(ValidateResponse::accepted(
                    license.tier,
                    license.features(),
                    license.expires_at,
                ))
            }
            Err(reason) => {
                tracing::warn!(
                    license_key = %redact_key(&request.key),
                    instance_id = %request.instance_id,
                    source_ip = ?source_ip,
                    reason = %reason,
                    "License validation rejected"
                );
                Ok(ValidateResponse::rejected(reason))
            }
        }
    }

    async fn decide(
        &self,
        request: &ValidateRequest,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> LicensingResult<Verdict<License>> {
        let verdict = self
            .guard
            .check(Operation::Validate, request, source_ip, now)
            .await?;
        let fields = match verdict {
            Ok(fields) => fields,
            Err(reason) => return Ok(Err(reason)),
        };

        let license = match self.lookup(&fields).await? {
            Some(license) => license,
            None => return Ok(Err(RejectionReason::LicenseNotFound)),
        };

        if let Err(reason) = check_license(&license, now) {
            return Ok(Err(reason));
        }

        let decision = match self
            .repo
            .upsert_instance(&license.key, &request.instance_id, &request.version, now)
            .await
        {
            Ok(decision) => decision,
            // Deleted between lookup and lock
            Err(LicensingError::LicenseNotFound) => {
                return Ok(Err(RejectionReason::LicenseNotFound));
            }
            Err(e) => return Err(e),
        };

        match decision {
            InstanceDecision::Activated => {
                tracing::info!(
                    license_key = %redact_key(&license.key),
                    instance_id = %request.instance_id,
                    "Instance activated"
                );
                Ok(Ok(license))
            }
            InstanceDecision::Renewed => Ok(Ok(license)),
            InstanceDecision::LimitExceeded => Ok(Err(RejectionReason::InstanceLimitExceeded)),
        }
    }

    /// Licenses are stored under their canonical key text
    async fn lookup(&self, fields: &KeyFields) -> LicensingResult<Option<License>> {
        let canonical = fields.encode(self.config.key_secret.expose());
        self.repo.get_license(&canonical).await
    }
}
