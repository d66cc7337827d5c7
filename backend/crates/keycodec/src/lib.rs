//! License key codec and request signing.
//!
//! Pure functions, no I/O:
//! - [`key`] encodes structured license fields into a `SNOW-…` key,
//!   decodes keys back, and verifies their truncated HMAC checksum
//! - [`tier`] carries the per-tier feature set and instance limits
//! - [`signature`] is the request-signing scheme spoken by both the
//!   validation service and the embedded client
//! - [`protocol`] holds the JSON bodies of the validation endpoint
//!
//! ## Key format
//! ```text
//! SNOW-{TIER}-{ORG}-{DEV}/{STAKE}-{YYYYMMDD}-{CHECKSUM}
//! SNOW-{TIER}-{ORG}-{YYYYMMDD}-{CHECKSUM}            (legacy, unlimited seats)
//! ```

pub mod error;
pub mod key;
pub mod protocol;
pub mod seats;
pub mod signature;
pub mod tier;

pub use error::{KeyError, KeyResult};
pub use key::{
    KeyFields, checksum, decode, encode, encode_legacy, normalize_organization, redact_key, verify,
};
pub use protocol::{DeactivateResponse, RejectionReason, ValidateRequest, ValidateResponse};
pub use seats::{SeatCount, Seats};
pub use signature::Operation;
pub use tier::{InstanceLimit, Tier};
