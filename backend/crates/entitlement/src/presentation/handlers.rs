//! HTTP Handlers

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use platform::client::extract_client_ip;
use platform::rate_limit::RateLimitStore;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::config::LicensingConfig;
use crate::application::deactivate_instance::DeactivateInstanceUseCase;
use crate::application::validate_license::{ValidateLicenseInput, ValidateLicenseUseCase};
use crate::domain::repository::LicensingRepository;
use crate::error::LicensingResult;
use crate::presentation::dto::{HealthResponse, RejectionReason, ValidateRequest};

/// Shared state for licensing handlers
#[derive(Clone)]
pub struct LicensingAppState<R>
where
    R: LicensingRepository + RateLimitStore + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub config: Arc<LicensingConfig>,
}

/// POST /validate
///
/// Protocol rejections answer 200 with `valid: false`; only rate limiting
/// changes the status code.
pub async fn validate<R>(
    State(state): State<LicensingAppState<R>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ValidateRequest>,
) -> LicensingResult<Response>
where
    R: LicensingRepository + RateLimitStore + Clone + Send + Sync + 'static,
{
    let source_ip = extract_client_ip(&headers, Some(addr.ip()), &state.config.trusted_proxies);

    let use_case =
        ValidateLicenseUseCase::new(state.repo.clone(), state.repo.clone(), state.config.clone());

    let response = use_case
        .execute(
            ValidateLicenseInput {
                request: req,
                source_ip,
            },
            Utc::now(),
        )
        .await?;

    let status = status_for(response.reason);
    Ok((status, Json(response)).into_response())
}

/// POST /deactivate
pub async fn deactivate<R>(
    State(state): State<LicensingAppState<R>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ValidateRequest>,
) -> LicensingResult<Response>
where
    R: LicensingRepository + RateLimitStore + Clone + Send + Sync + 'static,
{
    let source_ip = extract_client_ip(&headers, Some(addr.ip()), &state.config.trusted_proxies);

    let use_case = DeactivateInstanceUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.config.clone(),
    );

    let response = use_case
        .execute(
            ValidateLicenseInput {
                request: req,
                source_ip,
            },
            Utc::now(),
        )
        .await?;

    let status = status_for(response.reason);
    Ok((status, Json(response)).into_response())
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn status_for(reason: Option<RejectionReason>) -> StatusCode {
    match reason {
        Some(RejectionReason::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::OK,
    }
}
