//! Embedded Client Validator
//!
//! Runs inside the licensed product:
//! - `instance` - persistent installation ID
//! - `cache` - last decision from the validation service, on disk
//! - `transport` - signed HTTPS round-trips to `/validate` and `/deactivate`
//! - `validator` - the state machine tying them together
//!
//! ## Offline behavior
//! A successful validation is trusted for `check_interval`. When the
//! service cannot be reached the cached entitlement is honored for
//! `grace_period` after the last success. An explicit rejection from the
//! service always wins over the cache.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
mod fs_util;
pub mod instance;
pub mod state;
pub mod transport;
pub mod validator;

pub use cache::{CacheStore, ClientCache, Entitlement};
pub use clock::{Clock, SystemClock};
pub use config::ValidatorConfig;
pub use error::{TransportError, ValidatorError, ValidatorResult};
pub use state::ValidationState;
pub use transport::{HttpTransport, ValidationTransport};
pub use validator::ClientValidator;

#[cfg(test)]
mod tests;
