//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations for the licensing crates:
//! - Cryptographic utilities (HMAC-SHA256, constant-time compare)
//! - Secret byte strings that are wiped on drop
//! - Sliding-window rate limiting
//! - Client address extraction (feature `axum`)

#[cfg(feature = "axum")]
pub mod client;
pub mod crypto;
pub mod rate_limit;
