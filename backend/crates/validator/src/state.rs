//! Validation state machine
//!
//! `Unchecked → Valid → (Valid | Grace | Invalid)`. `Grace` honors the
//! cached entitlement while the service is unreachable.

use keycodec::RejectionReason;

use crate::cache::Entitlement;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationState {
    #[default]
    Unchecked,
    Valid(Entitlement),
    Grace(Entitlement),
    /// `None` when no explicit rejection is known (grace ran out, no cache)
    Invalid(Option<RejectionReason>),
}

impl ValidationState {
    pub fn entitlement(&self) -> Option<&Entitlement> {
        match self {
            Self::Valid(e) | Self::Grace(e) => Some(e),
            Self::Unchecked | Self::Invalid(_) => None,
        }
    }

    pub fn is_entitled(&self) -> bool {
        self.entitlement().is_some()
    }

    /// Local check, never touches the network
    pub fn has_feature(&self, name: &str) -> bool {
        self.entitlement().is_some_and(|e| e.has_feature(name))
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Invalid(reason) => *reason,
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Valid(_) => "valid",
            Self::Grace(_) => "grace",
            Self::Invalid(_) => "invalid",
        }
    }
}
