//! License tiers, features and instance limits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;
use crate::seats::Seats;

/// Commercial license tier.
///
/// Serialized as `PROFESSIONAL` / `TEAM` / `ENTERPRISE`; the key text uses
/// the short codes `PRO` / `TEAM` / `ENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Professional,
    Team,
    Enterprise,
}

const PROFESSIONAL_FEATURES: &[&str] = &["advanced-tools", "jira-sync"];

const TEAM_FEATURES: &[&str] = &[
    "advanced-tools",
    "jira-sync",
    "azure-devops-sync",
    "confluence-sync",
    "team-workspaces",
];

const ENTERPRISE_FEATURES: &[&str] = &[
    "advanced-tools",
    "jira-sync",
    "azure-devops-sync",
    "confluence-sync",
    "team-workspaces",
    "sso",
    "audit-export",
    "ml-analytics",
    "priority-support",
];

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Professional, Tier::Team, Tier::Enterprise];

    /// Code used inside license keys
    pub const fn code(&self) -> &'static str {
        match self {
            Tier::Professional => "PRO",
            Tier::Team => "TEAM",
            Tier::Enterprise => "ENT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PRO" => Some(Tier::Professional),
            "TEAM" => Some(Tier::Team),
            "ENT" => Some(Tier::Enterprise),
            _ => None,
        }
    }

    /// Feature identifiers granted by this tier (cumulative)
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Tier::Professional => PROFESSIONAL_FEATURES,
            Tier::Team => TEAM_FEATURES,
            Tier::Enterprise => ENTERPRISE_FEATURES,
        }
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features().contains(&feature)
    }

    /// Concurrent activations when the key does not cap developer seats
    pub const fn default_instance_limit(&self) -> InstanceLimit {
        match self {
            Tier::Professional => InstanceLimit::Limited(1),
            Tier::Team => InstanceLimit::Limited(10),
            Tier::Enterprise => InstanceLimit::Unlimited,
        }
    }

    /// Instance limit for a key of this tier with the given seats.
    ///
    /// A limited developer seat count caps activations; otherwise the
    /// tier default applies.
    pub fn instance_limit(&self, seats: Option<&Seats>) -> InstanceLimit {
        match seats.and_then(|s| s.developer.limit()) {
            Some(n) => InstanceLimit::Limited(n),
            None => self.default_instance_limit(),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Tier {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::from_code(s).ok_or_else(|| KeyError::malformed(format!("unknown tier `{s}`")))
    }
}

/// Maximum number of concurrently activated instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceLimit {
    Limited(u32),
    Unlimited,
}

impl InstanceLimit {
    /// Whether one more instance fits next to `active` existing ones
    pub const fn admits(&self, active: u64) -> bool {
        match self {
            InstanceLimit::Limited(n) => active < *n as u64,
            InstanceLimit::Unlimited => true,
        }
    }

    /// Database representation: `-1` is unlimited
    pub const fn to_db(&self) -> i32 {
        match self {
            InstanceLimit::Limited(n) => *n as i32,
            InstanceLimit::Unlimited => -1,
        }
    }

    pub const fn from_db(value: i32) -> Self {
        if value < 0 {
            InstanceLimit::Unlimited
        } else {
            InstanceLimit::Limited(value as u32)
        }
    }
}
