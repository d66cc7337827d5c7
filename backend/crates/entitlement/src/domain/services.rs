//! Domain Services
//!
//! Pure licensing rules, no I/O.

use chrono::{DateTime, NaiveDate, Utc};
use keycodec::RejectionReason;

use crate::domain::entities::License;

/// A license is valid through the whole of its expiry date (UTC) and
/// expired from 00:00:00 on the following day.
pub fn is_expired(expires_at: NaiveDate, now: DateTime<Utc>) -> bool {
    now.date_naive() > expires_at
}

/// Status and expiry checks for a stored license
pub fn check_license(license: &License, now: DateTime<Utc>) -> Result<(), RejectionReason> {
    if let Some(reason) = license.status.rejection() {
        return Err(reason);
    }
    if is_expired(license.expires_at, now) {
        return Err(RejectionReason::LicenseExpired);
    }
    Ok(())
}
