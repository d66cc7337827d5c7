//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in `infra`.

use chrono::{DateTime, Utc};

use crate::domain::entities::{License, LicenseInstance, ValidationLogEntry};
use crate::domain::value_objects::{InstanceDecision, LicenseStatus};
use crate::error::LicensingResult;

/// License repository trait
#[trait_variant::make(LicenseRepository: Send)]
pub trait LocalLicenseRepository {
    /// Look up a license by its canonical key
    async fn get_license(&self, key: &str) -> LicensingResult<Option<License>>;

    /// Insert a new license; `LicenseExists` if the key is taken
    async fn insert_license(&self, license: &License) -> LicensingResult<()>;

    /// Change the status; returns false if the license does not exist
    async fn set_license_status(&self, key: &str, status: LicenseStatus)
    -> LicensingResult<bool>;
}

/// Instance repository trait
#[trait_variant::make(InstanceRepository: Send)]
pub trait LocalInstanceRepository {
    /// Activate or renew `(key, instance_id)`.
    ///
    /// Serialized per license key: concurrent first activations never
    /// exceed the license's instance limit. A known instance is always
    /// renewed. Fails with `LicenseNotFound` if the license row is gone.
    async fn upsert_instance(
        &self,
        key: &str,
        instance_id: &str,
        client_version: &str,
        now: DateTime<Utc>,
    ) -> LicensingResult<InstanceDecision>;

    /// Remove an activation; returns whether a row was deleted
    async fn deactivate_instance(&self, key: &str, instance_id: &str) -> LicensingResult<bool>;

    async fn list_instances(&self, key: &str) -> LicensingResult<Vec<LicenseInstance>>;

    /// Delete instances not seen since `older_than`
    async fn reap_stale_instances(&self, older_than: DateTime<Utc>) -> LicensingResult<u64>;
}

/// Validation log repository trait (append-only)
#[trait_variant::make(ValidationLogRepository: Send)]
pub trait LocalValidationLogRepository {
    async fn append_log(&self, entry: &ValidationLogEntry) -> LicensingResult<()>;
}

/// Everything the licensing use cases need from storage
pub trait LicensingRepository:
    LicenseRepository + InstanceRepository + ValidationLogRepository + Send + Sync + 'static
{
}

impl<T> LicensingRepository for T where
    T: LicenseRepository + InstanceRepository + ValidationLogRepository + Send + Sync + 'static
{
}
