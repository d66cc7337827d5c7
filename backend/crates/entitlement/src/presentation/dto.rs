//! API DTOs
//!
//! Request and response bodies shared with the client live in
//! `keycodec::protocol`.

use serde::Serialize;

pub use keycodec::protocol::{
    DeactivateResponse, RejectionReason, ValidateRequest, ValidateResponse,
};

/// Response for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
