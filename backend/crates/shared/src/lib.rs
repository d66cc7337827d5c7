//! Shared Kernel - Domain-crossing minimal core
//!
//! The smallest vocabulary shared by the licensing crates:
//! - Unified error type and result alias, with HTTP status mapping
//! - Typed ID wrappers for persisted records
//!
//! Only things with a consistent meaning across every crate belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
