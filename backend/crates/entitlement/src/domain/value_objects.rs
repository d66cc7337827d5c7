//! Domain Value Objects

use keycodec::RejectionReason;
use std::fmt;

/// Administrative state of a license
///
/// Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i16)]
pub enum LicenseStatus {
    #[default]
    Active = 0,

    /// Temporarily disabled, e.g. unpaid invoice
    Suspended = 1,

    /// Permanently withdrawn
    Revoked = 2,
}

impl LicenseStatus {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Active),
            1 => Some(Self::Suspended),
            2 => Some(Self::Revoked),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// Rejection produced by a non-active status
    pub const fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Active => None,
            Self::Suspended => Some(RejectionReason::CustomerSuspended),
            Self::Revoked => Some(RejectionReason::LicenseRevoked),
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result recorded in the validation log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    Deactivated,
    Rejected(RejectionReason),
}

impl ValidationOutcome {
    /// `accepted`, `deactivated`, or the rejection code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Deactivated => "deactivated",
            Self::Rejected(reason) => reason.code(),
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "accepted" => Some(Self::Accepted),
            "deactivated" => Some(Self::Deactivated),
            other => RejectionReason::from_code(other).map(Self::Rejected),
        }
    }

    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

impl From<RejectionReason> for ValidationOutcome {
    fn from(reason: RejectionReason) -> Self {
        Self::Rejected(reason)
    }
}

/// Result of an instance activation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceDecision {
    /// New instance took a free slot
    Activated,
    /// Known instance, `last_seen_at` refreshed
    Renewed,
    LimitExceeded,
}

impl InstanceDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::LimitExceeded)
    }
}
