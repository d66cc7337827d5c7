//! In-memory Repository
//!
//! Same contracts as the Postgres repository. Each license has its own
//! mutex, so activations on one key never wait on another key.

use chrono::{DateTime, Utc};
use platform::rate_limit::{
    InMemoryRateLimiter, RateLimitConfig, RateLimitError, RateLimitResult, RateLimitStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::entities::{License, LicenseInstance, ValidationLogEntry};
use crate::domain::repository::{InstanceRepository, LicenseRepository, ValidationLogRepository};
use crate::domain::value_objects::{InstanceDecision, LicenseStatus};
use crate::error::{LicensingError, LicensingResult};

#[derive(Debug)]
struct LicenseSlot {
    license: License,
    /// Keyed by client instance ID
    instances: HashMap<String, LicenseInstance>,
}

#[derive(Debug, Default)]
struct Inner {
    licenses: RwLock<HashMap<String, Arc<Mutex<LicenseSlot>>>>,
    log: Mutex<Vec<ValidationLogEntry>>,
    rate_limiter: InMemoryRateLimiter,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLicenseRepository {
    inner: Arc<Inner>,
}

impl InMemoryLicenseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the validation log, oldest first
    pub async fn log_entries(&self) -> Vec<ValidationLogEntry> {
        self.inner.log.lock().await.clone()
    }

    /// Drop stale rate-limit buckets
    pub async fn cleanup_expired(&self, config: &RateLimitConfig) -> usize {
        self.inner
            .rate_limiter
            .prune(config, Utc::now().timestamp_millis())
            .await
    }

    async fn slot(&self, key: &str) -> Option<Arc<Mutex<LicenseSlot>>> {
        self.inner.licenses.read().await.get(key).cloned()
    }
}

impl LicenseRepository for InMemoryLicenseRepository {
    async fn get_license(&self, key: &str) -> LicensingResult<Option<License>> {
        match self.slot(key).await {
            Some(slot) => Ok(Some(slot.lock().await.license.clone())),
            None => Ok(None),
        }
    }

    async fn insert_license(&self, license: &License) -> LicensingResult<()> {
        let mut licenses = self.inner.licenses.write().await;
        if licenses.contains_key(&license.key) {
            return Err(LicensingError::LicenseExists);
        }
        licenses.insert(
            license.key.clone(),
            Arc::new(Mutex::new(LicenseSlot {
                license: license.clone(),
                instances: HashMap::new(),
            })),
        );
        Ok(())
    }

    async fn set_license_status(
        &self,
        key: &str,
        status: LicenseStatus,
    ) -> LicensingResult<bool> {
        match self.slot(key).await {
            Some(slot) => {
                slot.lock().await.license.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl InstanceRepository for InMemoryLicenseRepository {
    async fn upsert_instance(
        &self,
        key: &str,
        instance_id: &str,
        client_version: &str,
        now: DateTime<Utc>,
    ) -> LicensingResult<InstanceDecision> {
        let slot = self.slot(key).await.ok_or(LicensingError::LicenseNotFound)?;
        let mut slot = slot.lock().await;

        if let Some(instance) = slot.instances.get_mut(instance_id) {
            instance.touch(client_version, now);
            return Ok(InstanceDecision::Renewed);
        }

        if !slot
            .license
            .instance_limit
            .admits(slot.instances.len() as u64)
        {
            return Ok(InstanceDecision::LimitExceeded);
        }

        slot.instances.insert(
            instance_id.to_string(),
            LicenseInstance::new(key, instance_id, client_version, now),
        );
        Ok(InstanceDecision::Activated)
    }

    async fn deactivate_instance(&self, key: &str, instance_id: &str) -> LicensingResult<bool> {
        match self.slot(key).await {
            Some(slot) => Ok(slot.lock().await.instances.remove(instance_id).is_some()),
            None => Ok(false),
        }
    }

    async fn list_instances(&self, key: &str) -> LicensingResult<Vec<LicenseInstance>> {
        let Some(slot) = self.slot(key).await else {
            return Ok(Vec::new());
        };
        let mut instances: Vec<_> = slot.lock().await.instances.values().cloned().collect();
        instances.sort_by_key(|i| i.first_seen_at);
        Ok(instances)
    }

    async fn reap_stale_instances(&self, older_than: DateTime<Utc>) -> LicensingResult<u64> {
        let slots: Vec<_> = self.inner.licenses.read().await.values().cloned().collect();
        let mut reaped = 0u64;
        for slot in slots {
            let mut slot = slot.lock().await;
            let before = slot.instances.len();
            slot.instances.retain(|_, i| i.last_seen_at >= older_than);
            reaped += (before - slot.instances.len()) as u64;
        }
        Ok(reaped)
    }
}

impl ValidationLogRepository for InMemoryLicenseRepository {
    async fn append_log(&self, entry: &ValidationLogEntry) -> LicensingResult<()> {
        self.inner.log.lock().await.push(entry.clone());
        Ok(())
    }
}

impl RateLimitStore for InMemoryLicenseRepository {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.inner
            .rate_limiter
            .check_and_increment(key, config, now_ms)
            .await
    }
}
