//! Domain Layer - Licensing rules and entities
//!
//! - Entities (License, LicenseInstance, ValidationLogEntry)
//! - Value objects (LicenseStatus, ValidationOutcome, InstanceDecision)
//! - Domain services (expiry and status checks)
//! - Repository traits

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
