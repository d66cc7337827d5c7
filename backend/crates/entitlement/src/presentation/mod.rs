//! Presentation Layer
//!
//! HTTP handlers and DTOs.

pub mod dto;
pub mod handlers;
pub mod router;
