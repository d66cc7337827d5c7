//! License key encoding, decoding and checksum verification.
//!
//! The checksum is the first 8 hex digits (uppercase) of
//! `HMAC-SHA256(secret, payload)`, where the payload is the key text
//! between the `SNOW-` prefix and the checksum segment:
//!
//! ```text
//! {TIER}-{ORG}-{DEV}/{STAKE}-{YYYYMMDD}    seat-based
//! {TIER}-{ORG}-{YYYYMMDD}                  legacy
//! ```
//!
//! Seat counts may be `-1`, so the seat segment itself can contain dashes.
//! Decoding therefore anchors on both ends of the key and rejoins whatever
//! lies between the organization and the date.

use chrono::{Datelike, NaiveDate};
use platform::crypto::{constant_time_eq, hmac_sha256};
use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};
use crate::seats::{SeatCount, Seats};
use crate::tier::{InstanceLimit, Tier};

pub const KEY_PREFIX: &str = "SNOW";

/// Normalized organization names are cut to this many characters
pub const MAX_ORGANIZATION_LEN: usize = 20;

pub const CHECKSUM_LEN: usize = 8;

const LEGACY_SEGMENTS: usize = 5;
const MIN_SEAT_SEGMENTS: usize = 6;
// `-1/-1` splits into three extra parts
const MAX_SEAT_SEGMENTS: usize = 8;

/// Structured content of a license key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFields {
    pub tier: Tier,
    pub organization: String,
    /// `None` for legacy keys, which imply unlimited seats for both roles
    pub seats: Option<Seats>,
    pub expires_at: NaiveDate,
}

impl KeyFields {
    /// Build fields, normalizing the organization
    pub fn new(
        tier: Tier,
        organization: &str,
        seats: Option<Seats>,
        expires_at: NaiveDate,
    ) -> KeyResult<Self> {
        let organization = normalize_organization(organization);
        if organization.is_empty() {
            return Err(KeyError::InvalidOrganization);
        }
        Ok(Self {
            tier,
            organization,
            seats,
            expires_at,
        })
    }

    pub fn is_legacy(&self) -> bool {
        self.seats.is_none()
    }

    /// Seats with the legacy "unlimited for both" rule applied
    pub fn effective_seats(&self) -> Seats {
        self.seats.unwrap_or(Seats::UNLIMITED)
    }

    pub fn instance_limit(&self) -> InstanceLimit {
        self.tier.instance_limit(self.seats.as_ref())
    }

    /// Payload covered by the checksum
    pub fn canonical_payload(&self) -> String {
        let date = format_date(self.expires_at);
        match &self.seats {
            Some(seats) => format!(
                "{}-{}-{}-{}",
                self.tier.code(),
                self.organization,
                seats.segment(),
                date
            ),
            None => format!("{}-{}-{}", self.tier.code(), self.organization, date),
        }
    }

    /// Full key text under `secret`
    pub fn encode(&self, secret: &[u8]) -> String {
        let payload = self.canonical_payload();
        format!("{KEY_PREFIX}-{payload}-{}", checksum(&payload, secret))
    }
}

/// Uppercase ASCII letters and digits only, truncated to [`MAX_ORGANIZATION_LEN`]
pub fn normalize_organization(organization: &str) -> String {
    organization
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_ORGANIZATION_LEN)
        .collect()
}

/// First 8 uppercase hex digits of `HMAC-SHA256(secret, payload)`
pub fn checksum(payload: &str, secret: &[u8]) -> String {
    let mac = hmac_sha256(secret, payload.as_bytes());
    let mut hex = String::with_capacity(CHECKSUM_LEN);
    for byte in &mac[..CHECKSUM_LEN / 2] {
        hex.push_str(&format!("{byte:02X}"));
    }
    hex
}

/// Encode a seat-based key
pub fn encode(
    tier: Tier,
    organization: &str,
    developer_seats: i32,
    stakeholder_seats: i32,
    expires_at: NaiveDate,
    secret: &[u8],
) -> KeyResult<String> {
    let seats = Seats::new(
        SeatCount::new(developer_seats)?,
        SeatCount::new(stakeholder_seats)?,
    );
    Ok(KeyFields::new(tier, organization, Some(seats), expires_at)?.encode(secret))
}

/// Encode a legacy key without a seat segment
pub fn encode_legacy(
    tier: Tier,
    organization: &str,
    expires_at: NaiveDate,
    secret: &[u8],
) -> KeyResult<String> {
    Ok(KeyFields::new(tier, organization, None, expires_at)?.encode(secret))
}

/// Decode a key into its fields without checking the checksum value
///
/// The checksum segment must still be 8 hex digits.
pub fn decode(key: &str) -> KeyResult<KeyFields> {
    decode_parts(key).map(|(fields, _)| fields)
}

/// Decode and check the checksum against `secret`
pub fn verify(key: &str, secret: &[u8]) -> KeyResult<KeyFields> {
    let (fields, provided) = decode_parts(key)?;
    let expected = checksum(&fields.canonical_payload(), secret);
    let provided = provided.to_ascii_uppercase();
    if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        return Err(KeyError::TamperedKey);
    }
    Ok(fields)
}

/// Key text safe for logs: prefix kept, checksum masked
pub fn redact_key(key: &str) -> String {
    const VISIBLE: usize = 13;
    let key = key.trim();
    if key.len() <= VISIBLE || !key.is_ascii() {
        return "****".to_string();
    }
    format!("{}…****", &key[..VISIBLE])
}

fn decode_parts(key: &str) -> KeyResult<(KeyFields, &str)> {
    let parts: Vec<&str> = key.trim().split('-').collect();
    let n = parts.len();

    if parts[0] != KEY_PREFIX {
        return Err(KeyError::malformed("missing SNOW prefix"));
    }

    let (seats, date, checksum) = match n {
        LEGACY_SEGMENTS => (None, parts[3], parts[4]),
        MIN_SEAT_SEGMENTS..=MAX_SEAT_SEGMENTS => {
            let segment = parts[3..n - 2].join("-");
            let seats = Seats::parse_segment(&segment)
                .ok_or_else(|| KeyError::malformed(format!("invalid seat segment `{segment}`")))?;
            (Some(seats), parts[n - 2], parts[n - 1])
        }
        _ => {
            return Err(KeyError::malformed(format!(
                "unexpected segment count {n}"
            )));
        }
    };

    let tier = parts[1].parse::<Tier>()?;

    let organization = parts[2];
    if organization.is_empty()
        || organization.len() > MAX_ORGANIZATION_LEN
        || !organization
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(KeyError::malformed("organization must be uppercase alphanumeric"));
    }

    let expires_at = parse_date(date)?;

    if checksum.len() != CHECKSUM_LEN || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KeyError::malformed("checksum must be 8 hex digits"));
    }

    Ok((
        KeyFields {
            tier,
            organization: organization.to_string(),
            seats,
            expires_at,
        },
        checksum,
    ))
}

fn format_date(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

fn parse_date(segment: &str) -> KeyResult<NaiveDate> {
    if segment.len() != 8 || !segment.chars().all(|c| c.is_ascii_digit()) {
        return Err(KeyError::malformed("date must be 8 digits"));
    }
    let field = |range: std::ops::Range<usize>| -> u32 {
        // all-digit and length-checked above
        segment[range].parse().unwrap_or(0)
    };
    NaiveDate::from_ymd_opt(field(0..4) as i32, field(4..6), field(6..8))
        .ok_or_else(|| KeyError::malformed(format!("`{segment}` is not a calendar date")))
}
