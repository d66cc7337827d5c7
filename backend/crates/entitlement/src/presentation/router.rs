//! Licensing Router

use axum::{
    Router,
    routing::{get, post},
};
use platform::rate_limit::RateLimitStore;
use std::sync::Arc;

use crate::application::config::LicensingConfig;
use crate::domain::repository::LicensingRepository;
use crate::infra::postgres::PgLicenseRepository;
use crate::presentation::handlers::{self, LicensingAppState};

/// Create the licensing router with PostgreSQL repository
pub fn licensing_router(repo: PgLicenseRepository, config: LicensingConfig) -> Router {
    licensing_router_generic(repo, config)
}

/// Create a licensing router for any repository implementation
pub fn licensing_router_generic<R>(repo: R, config: LicensingConfig) -> Router
where
    R: LicensingRepository + RateLimitStore + Clone + Send + Sync + 'static,
{
    let state = LicensingAppState {
        repo: Arc::new(repo),
        config: Arc::new(config),
    };

    Router::new()
        .route("/validate", post(handlers::validate::<R>))
        .route("/deactivate", post(handlers::deactivate::<R>))
        .route("/health", get(handlers::health))
        .with_state(state)
}
