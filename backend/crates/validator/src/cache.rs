//! Local license cache
//!
//! Holds the last decision from the validation service. Written after
//! every successful validation and every explicit rejection, never after
//! a connectivity failure: the stale cache is the fallback.

use chrono::{DateTime, NaiveDate, Utc};
use keycodec::{RejectionReason, Tier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ValidatorResult;
use crate::fs_util::write_atomic;

const CACHE_FILENAME: &str = "license-cache.json";

/// Entitlement granted by the last successful validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub tier: Tier,
    pub features: Vec<String>,
    pub expires_at: NaiveDate,
}

impl Entitlement {
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.iter().any(|f| f == name)
    }

    /// Valid through the whole expiry date (UTC)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCache {
    /// Key the decision was made for
    pub license_key: String,
    /// `None` after an explicit rejection
    pub entitlement: Option<Entitlement>,
    pub reason: Option<RejectionReason>,
    pub last_validated_at: DateTime<Utc>,
    pub next_check_at: DateTime<Utc>,
}

impl ClientCache {
    pub fn is_valid(&self) -> bool {
        self.entitlement.is_some()
    }
}

/// Cache file under the data directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CACHE_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable caches load as `None`
    pub fn load(&self) -> Option<ClientCache> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "License cache unreadable");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "License cache corrupt, ignoring");
                None
            }
        }
    }

    pub fn save(&self, cache: &ClientCache) -> ValidatorResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec_pretty(cache)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }

    pub fn clear(&self) -> ValidatorResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
