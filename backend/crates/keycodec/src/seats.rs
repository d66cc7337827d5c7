//! Seat counts
//!
//! Both `0` and `-1` mean "unlimited". They are kept distinct so a key
//! re-encodes to exactly the text it was decoded from.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{KeyError, KeyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct SeatCount(i32);

impl SeatCount {
    pub const UNLIMITED: SeatCount = SeatCount(-1);
    pub const UNLIMITED_ZERO: SeatCount = SeatCount(0);

    pub fn new(value: i32) -> KeyResult<Self> {
        if value < -1 {
            return Err(KeyError::InvalidSeats(value));
        }
        Ok(Self(value))
    }

    pub const fn get(&self) -> i32 {
        self.0
    }

    pub const fn is_unlimited(&self) -> bool {
        self.0 <= 0
    }

    /// Positive cap, or `None` when unlimited
    pub const fn limit(&self) -> Option<u32> {
        if self.0 > 0 { Some(self.0 as u32) } else { None }
    }

    /// Parse the canonical decimal form only (`7`, `0`, `-1`; not `07` or `+7`)
    pub(crate) fn parse_canonical(text: &str) -> Option<Self> {
        let value: i32 = text.parse().ok()?;
        if value.to_string() != text {
            return None;
        }
        Self::new(value).ok()
    }
}

impl TryFrom<i32> for SeatCount {
    type Error = KeyError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SeatCount> for i32 {
    fn from(seats: SeatCount) -> Self {
        seats.0
    }
}

impl fmt::Display for SeatCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Developer / stakeholder seat pair carried by seat-based keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seats {
    pub developer: SeatCount,
    pub stakeholder: SeatCount,
}

impl Seats {
    pub const fn new(developer: SeatCount, stakeholder: SeatCount) -> Self {
        Self {
            developer,
            stakeholder,
        }
    }

    /// Both roles unlimited, as implied by legacy keys
    pub const UNLIMITED: Seats = Seats::new(SeatCount::UNLIMITED, SeatCount::UNLIMITED);

    /// `DEV/STAKE` key segment
    pub fn segment(&self) -> String {
        format!("{}/{}", self.developer, self.stakeholder)
    }

    pub(crate) fn parse_segment(segment: &str) -> Option<Self> {
        let (dev, stake) = segment.split_once('/')?;
        Some(Self::new(
            SeatCount::parse_canonical(dev)?,
            SeatCount::parse_canonical(stake)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_count_bounds() {
        assert!(SeatCount::new(-1).is_ok());
        assert!(SeatCount::new(0).is_ok());
        assert!(SeatCount::new(250).is_ok());
        assert_eq!(SeatCount::new(-2), Err(KeyError::InvalidSeats(-2)));
    }

    #[test]
    fn test_unlimited_sentinels() {
        assert!(SeatCount::UNLIMITED.is_unlimited());
        assert!(SeatCount::UNLIMITED_ZERO.is_unlimited());
        assert_eq!(SeatCount::UNLIMITED.limit(), None);
        assert_eq!(SeatCount::new(4).unwrap().limit(), Some(4));
        assert_ne!(SeatCount::UNLIMITED, SeatCount::UNLIMITED_ZERO);
    }

    #[test]
    fn test_parse_segment() {
        let seats = Seats::parse_segment("10/-1").unwrap();
        assert_eq!(seats.developer.get(), 10);
        assert_eq!(seats.stakeholder.get(), -1);
        assert_eq!(seats.segment(), "10/-1");

        assert!(Seats::parse_segment("10").is_none());
        assert!(Seats::parse_segment("010/5").is_none());
        assert!(Seats::parse_segment("+1/5").is_none());
        assert!(Seats::parse_segment("-2/5").is_none());
        assert!(Seats::parse_segment("a/5").is_none());
    }

    #[test]
    fn test_seat_count_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<SeatCount>("-5").is_err());
        let seats: Seats = serde_json::from_str(r#"{"developer":3,"stakeholder":0}"#).unwrap();
        assert_eq!(seats.stakeholder, SeatCount::UNLIMITED_ZERO);
    }
}
