//! Domain Entities

use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{LicenseInstanceId, ValidationLogEntryId};
use keycodec::{InstanceLimit, KeyFields, SeatCount, Seats, Tier, ValidateRequest};
use std::net::IpAddr;

use crate::domain::value_objects::{LicenseStatus, ValidationOutcome};

/// Longest client-supplied string kept in the audit log
pub const MAX_LOGGED_FIELD_LEN: usize = 128;

/// License entity - an entitlement grant identified by its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    /// Canonical key text (uppercase checksum)
    pub key: String,
    pub tier: Tier,
    pub organization: String,
    /// `None` for legacy keys
    pub seats: Option<Seats>,
    pub expires_at: NaiveDate,
    pub instance_limit: InstanceLimit,
    pub status: LicenseStatus,
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Build a license from verified key fields.
    ///
    /// The stored key is re-encoded from `fields`, so it always matches
    /// what the codec produces for them.
    pub fn from_fields(
        fields: KeyFields,
        key_secret: &[u8],
        status: LicenseStatus,
        instance_limit: Option<InstanceLimit>,
    ) -> Self {
        Self {
            key: fields.encode(key_secret),
            instance_limit: instance_limit.unwrap_or_else(|| fields.instance_limit()),
            tier: fields.tier,
            organization: fields.organization,
            seats: fields.seats,
            expires_at: fields.expires_at,
            status,
            created_at: Utc::now(),
        }
    }

    pub fn key_fields(&self) -> KeyFields {
        KeyFields {
            tier: self.tier,
            organization: self.organization.clone(),
            seats: self.seats,
            expires_at: self.expires_at,
        }
    }

    pub fn developer_seats(&self) -> SeatCount {
        self.seats.unwrap_or(Seats::UNLIMITED).developer
    }

    pub fn stakeholder_seats(&self) -> SeatCount {
        self.seats.unwrap_or(Seats::UNLIMITED).stakeholder
    }

    pub fn features(&self) -> Vec<String> {
        self.tier.features().iter().map(|f| f.to_string()).collect()
    }
}

/// One activated installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseInstance {
    pub id: LicenseInstanceId,
    pub license_key: String,
    pub instance_id: String,
    pub client_version: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl LicenseInstance {
    pub fn new(
        license_key: &str,
        instance_id: &str,
        client_version: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LicenseInstanceId::new(),
            license_key: license_key.to_string(),
            instance_id: instance_id.to_string(),
            client_version: client_version.to_string(),
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    pub fn touch(&mut self, client_version: &str, now: DateTime<Utc>) {
        self.client_version = client_version.to_string();
        self.last_seen_at = now;
    }
}

/// Immutable audit record of one validation or deactivation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLogEntry {
    pub id: ValidationLogEntryId,
    pub license_key: String,
    pub instance_id: String,
    pub client_version: String,
    pub outcome: ValidationOutcome,
    pub source_ip: Option<IpAddr>,
    pub logged_at: DateTime<Utc>,
}

impl ValidationLogEntry {
    /// Record a request as received; oversized fields are truncated
    pub fn new(
        request: &ValidateRequest,
        outcome: ValidationOutcome,
        source_ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ValidationLogEntryId::new(),
            license_key: truncate(&request.key),
            instance_id: truncate(&request.instance_id),
            client_version: truncate(&request.version),
            outcome,
            source_ip,
            logged_at: now,
        }
    }
}

fn truncate(value: &str) -> String {
    value.chars().take(MAX_LOGGED_FIELD_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycodec::RejectionReason;

    const SECRET: &[u8] = b"test-key-secret";

    fn fields(seats: Option<Seats>) -> KeyFields {
        KeyFields::new(
            Tier::Team,
            "Acme Corporation",
            seats,
            NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_license_from_fields_derives_limit() {
        let seats = Seats::new(SeatCount::new(3).unwrap(), SeatCount::new(5).unwrap());
        let license = License::from_fields(fields(Some(seats)), SECRET, LicenseStatus::Active, None);

        assert_eq!(license.instance_limit, InstanceLimit::Limited(3));
        assert_eq!(license.organization, "ACMECORPORATION");
        assert_eq!(keycodec::verify(&license.key, SECRET).unwrap(), license.key_fields());
        assert!(license.features().contains(&"team-workspaces".to_string()));
    }

    #[test]
    fn test_license_limit_override() {
        let license = License::from_fields(
            fields(None),
            SECRET,
            LicenseStatus::Active,
            Some(InstanceLimit::Limited(2)),
        );
        assert_eq!(license.instance_limit, InstanceLimit::Limited(2));
        assert!(license.developer_seats().is_unlimited());
        assert!(license.stakeholder_seats().is_unlimited());
    }

    #[test]
    fn test_log_entry_truncates_fields() {
        let request = ValidateRequest {
            key: "K".repeat(1000),
            instance_id: "i".to_string(),
            version: "1.0.0".to_string(),
            timestamp: 0,
            signature: String::new(),
        };
        let entry = ValidationLogEntry::new(
            &request,
            RejectionReason::MalformedKey.into(),
            None,
            Utc::now(),
        );
        assert_eq!(entry.license_key.len(), MAX_LOGGED_FIELD_LEN);
        assert_eq!(entry.instance_id, "i");
    }
}
