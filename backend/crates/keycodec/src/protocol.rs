//! Validation endpoint wire types.
//!
//! Shared by the service and the embedded client so both sides agree on
//! field names and rejection codes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signature::{Operation, SignedFields};
use crate::tier::Tier;

/// Body of `POST /validate` and `POST /deactivate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub key: String,
    pub instance_id: String,
    pub version: String,
    /// Unix seconds at signing time
    pub timestamp: i64,
    /// Lowercase hex HMAC, see [`crate::signature`]
    pub signature: String,
}

impl ValidateRequest {
    /// Build and sign a request for `operation`
    pub fn signed(
        operation: Operation,
        key: impl Into<String>,
        instance_id: impl Into<String>,
        version: impl Into<String>,
        timestamp: i64,
        client_secret: &[u8],
    ) -> Self {
        let mut request = Self {
            key: key.into(),
            instance_id: instance_id.into(),
            version: version.into(),
            timestamp,
            signature: String::new(),
        };
        request.signature = request.signed_fields(operation).sign(client_secret);
        request
    }

    pub fn signed_fields(&self, operation: Operation) -> SignedFields<'_> {
        SignedFields {
            operation,
            key: &self.key,
            instance_id: &self.instance_id,
            version: &self.version,
            timestamp: self.timestamp,
        }
    }

    pub fn has_valid_signature(&self, operation: Operation, client_secret: &[u8]) -> bool {
        self.signed_fields(operation)
            .verify(client_secret, &self.signature)
    }
}

/// Why a validation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    MalformedKey,
    TamperedKey,
    LicenseNotFound,
    LicenseExpired,
    CustomerSuspended,
    LicenseRevoked,
    InstanceLimitExceeded,
    InvalidSignature,
    StaleRequest,
    RateLimited,
}

impl RejectionReason {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedKey => "MalformedKey",
            Self::TamperedKey => "TamperedKey",
            Self::LicenseNotFound => "LicenseNotFound",
            Self::LicenseExpired => "LicenseExpired",
            Self::CustomerSuspended => "CustomerSuspended",
            Self::LicenseRevoked => "LicenseRevoked",
            Self::InstanceLimitExceeded => "InstanceLimitExceeded",
            Self::InvalidSignature => "InvalidSignature",
            Self::StaleRequest => "StaleRequest",
            Self::RateLimited => "RateLimited",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "MalformedKey" => Self::MalformedKey,
            "TamperedKey" => Self::TamperedKey,
            "LicenseNotFound" => Self::LicenseNotFound,
            "LicenseExpired" => Self::LicenseExpired,
            "CustomerSuspended" => Self::CustomerSuspended,
            "LicenseRevoked" => Self::LicenseRevoked,
            "InstanceLimitExceeded" => Self::InstanceLimitExceeded,
            "InvalidSignature" => Self::InvalidSignature,
            "StaleRequest" => Self::StaleRequest,
            "RateLimited" => Self::RateLimited,
            _ => return None,
        })
    }

    /// Retrying later may succeed; everything else is authoritative
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Entitlement decision returned by `POST /validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl ValidateResponse {
    pub fn accepted(tier: Tier, features: Vec<String>, expires_at: NaiveDate) -> Self {
        Self {
            valid: true,
            tier: Some(tier),
            features: Some(features),
            expires_at: Some(expires_at),
            reason: None,
        }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self {
            valid: false,
            tier: None,
            features: None,
            expires_at: None,
            reason: Some(reason),
        }
    }
}

/// Body returned by `POST /deactivate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateResponse {
    pub deactivated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case() {
        let request = ValidateRequest::signed(
            Operation::Validate,
            "SNOW-KEY",
            "inst-1",
            "1.0.0",
            42,
            b"secret",
        );
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""instanceId":"inst-1""#));
        assert!(json.contains(r#""timestamp":42"#));
        assert!(request.has_valid_signature(Operation::Validate, b"secret"));
        assert!(!request.has_valid_signature(Operation::Validate, b"other"));
    }

    #[test]
    fn test_signature_is_bound_to_operation() {
        let request =
            ValidateRequest::signed(Operation::Validate, "SNOW-KEY", "inst-1", "1.0.0", 42, b"s");
        assert!(!request.has_valid_signature(Operation::Deactivate, b"s"));

        let request =
            ValidateRequest::signed(Operation::Deactivate, "SNOW-KEY", "inst-1", "1.0.0", 42, b"s");
        assert!(request.has_valid_signature(Operation::Deactivate, b"s"));
        assert!(!request.has_valid_signature(Operation::Validate, b"s"));
    }

    #[test]
    fn test_rejection_omits_entitlement_fields() {
        let json =
            serde_json::to_string(&ValidateResponse::rejected(RejectionReason::StaleRequest))
                .unwrap();
        assert_eq!(json, r#"{"valid":false,"reason":"StaleRequest"}"#);
    }

    #[test]
    fn test_accepted_response_shape() {
        let response = ValidateResponse::accepted(
            Tier::Team,
            vec!["jira-sync".to_string()],
            NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
        );
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"valid":true,"tier":"TEAM","features":["jira-sync"],"expiresAt":"2026-11-03"}"#
        );
        let parsed: ValidateResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_reason_codes_match_serde() {
        let all = [
            RejectionReason::MalformedKey,
            RejectionReason::TamperedKey,
            RejectionReason::LicenseNotFound,
            RejectionReason::LicenseExpired,
            RejectionReason::CustomerSuspended,
            RejectionReason::LicenseRevoked,
            RejectionReason::InstanceLimitExceeded,
            RejectionReason::InvalidSignature,
            RejectionReason::StaleRequest,
            RejectionReason::RateLimited,
        ];
        for reason in all {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.code()));
            assert_eq!(RejectionReason::from_code(reason.code()), Some(reason));
        }
        assert!(RejectionReason::RateLimited.is_transient());
        assert!(!RejectionReason::TamperedKey.is_transient());
    }
}
