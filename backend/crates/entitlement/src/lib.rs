//! Entitlement Store and Validation Service
//!
//! Clean Architecture structure:
//! - `domain/` - Licenses, instances, audit log, repository traits
//! - `application/` - Use cases (validate, deactivate, manage licenses)
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers and router
//!
//! ## Validation order
//! rate limit → signature → replay window → key checksum → license
//! status and expiry → instance upsert. Every decision is appended to the
//! validation log before the response is sent.
//!
//! ## Instance limit
//! Activations are serialized per license key (row lock in Postgres, a
//! per-key mutex in memory), so concurrent first activations never exceed
//! the limit. Different keys never contend.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

pub use application::config::LicensingConfig;
pub use domain::entities::{License, LicenseInstance, ValidationLogEntry};
pub use domain::value_objects::{InstanceDecision, LicenseStatus, ValidationOutcome};
pub use error::{LicensingError, LicensingResult};
pub use infra::memory::InMemoryLicenseRepository;
pub use infra::postgres::PgLicenseRepository;
pub use presentation::router::{licensing_router, licensing_router_generic};

pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
