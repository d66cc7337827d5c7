//! Manage License Use Case
//!
//! Store seam for the administrative collaborator: registering keys it
//! generated and changing license status.

use keycodec::{InstanceLimit, redact_key};
use std::sync::Arc;

use crate::application::config::LicensingConfig;
use crate::domain::entities::License;
use crate::domain::repository::LicenseRepository;
use crate::domain::value_objects::LicenseStatus;
use crate::error::{LicensingError, LicensingResult};

pub struct ManageLicenseUseCase<L>
where
    L: LicenseRepository,
{
    license_repo: Arc<L>,
    config: Arc<LicensingConfig>,
}

impl<L> ManageLicenseUseCase<L>
where
    L: LicenseRepository,
{
    pub fn new(license_repo: Arc<L>, config: Arc<LicensingConfig>) -> Self {
        Self {
            license_repo,
            config,
        }
    }

    /// Register a generated key.
    ///
    /// The key must verify against the deployment secret; tier,
    /// organization, seats and expiry are taken from it. Without an
    /// override the instance limit is derived from tier and seats.
    pub async fn issue(
        &self,
        key: &str,
        status: LicenseStatus,
        instance_limit: Option<InstanceLimit>,
    ) -> LicensingResult<License> {
        let key_secret = self.config.key_secret.expose();
        let fields = keycodec::verify(key, key_secret)?;
        let license = License::from_fields(fields, key_secret, status, instance_limit);

        self.license_repo.insert_license(&license).await?;

        tracing::info!(
            license_key = %redact_key(&license.key),
            tier = %license.tier,
            instance_limit = license.instance_limit.to_db(),
            "License issued"
        );

        Ok(license)
    }

    pub async fn set_status(&self, key: &str, status: LicenseStatus) -> LicensingResult<()> {
        let fields = keycodec::verify(key, self.config.key_secret.expose())?;
        let canonical = fields.encode(self.config.key_secret.expose());

        if !self
            .license_repo
            .set_license_status(&canonical, status)
            .await?
        {
            return Err(LicensingError::LicenseNotFound);
        }

        tracing::info!(
            license_key = %redact_key(&canonical),
            status = %status,
            "License status changed"
        );
        Ok(())
    }
}
