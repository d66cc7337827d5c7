//! Licensing API Server Entry Point
//!
//! Loads configuration, runs migrations and maintenance, then serves the
//! validation endpoints. Uses `anyhow` for startup errors; request-level
//! errors go through `kernel::error::AppError`.

use axum::{
    Router, http,
    http::{Method, header},
};
use entitlement::domain::repository::InstanceRepository;
use entitlement::{LicensingConfig, PgLicenseRepository, licensing_router};
use platform::crypto::SecretBytes;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:31113";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,entitlement=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let config = licensing_config()?;
    let repo = PgLicenseRepository::new(pool.clone());

    // Startup maintenance; failures here should not prevent server startup
    if let Err(e) = repo.cleanup_expired(config.rate_limit_window).await {
        tracing::warn!(error = %e, "Rate-limit cleanup failed, continuing anyway");
    }

    if let Some(reap_after) = config.instance_reap_after {
        let older_than = reap_cutoff(chrono::Utc::now(), reap_after)?;
        match repo.reap_stale_instances(older_than).await {
            Ok(reaped) => {
                tracing::info!(reaped, %older_than, "Stale license instances reaped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Instance reaping failed, continuing anyway");
            }
        }
    }

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE, header::ACCEPT]));

    let app = Router::new()
        .merge(licensing_router(repo, config))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = env::var("LISTEN_ADDR")
        .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
        .parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Secrets from the environment; debug builds fall back to random ones
fn licensing_config() -> anyhow::Result<LicensingConfig> {
    let key_secret = secret_from_env("LICENSE_KEY_SECRET")?;
    let client_secret = secret_from_env("LICENSE_CLIENT_SECRET")?;

    let mut config = match (key_secret, client_secret) {
        (Some(key_secret), Some(client_secret)) => LicensingConfig {
            key_secret,
            client_secret,
            ..LicensingConfig::default()
        },
        _ if cfg!(debug_assertions) => {
            tracing::warn!("License secrets not set, using random development secrets");
            LicensingConfig::development()
        }
        _ => anyhow::bail!("LICENSE_KEY_SECRET and LICENSE_CLIENT_SECRET must be set in production"),
    };

    if let Ok(days) = env::var("LICENSE_INSTANCE_REAP_DAYS") {
        config.instance_reap_after = Some(reap_after_days(days.trim().parse()?)?);
    }

    if let Ok(proxies) = env::var("TRUSTED_PROXIES") {
        config.trusted_proxies = parse_trusted_proxies(&proxies)?;
    }

    Ok(config)
}

fn secret_from_env(name: &str) -> anyhow::Result<Option<SecretBytes>> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(SecretBytes::from_base64(&value)?)),
        _ => Ok(None),
    }
}

fn reap_after_days(days: u64) -> anyhow::Result<Duration> {
    days.checked_mul(24 * 60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("LICENSE_INSTANCE_REAP_DAYS is too large: {days}"))
}

/// Instances last seen before this instant are reaped
fn reap_cutoff(
    now: chrono::DateTime<chrono::Utc>,
    reap_after: Duration,
) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    chrono::Duration::from_std(reap_after)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| anyhow::anyhow!("Instance reap period is out of range"))
}

/// Comma-separated proxy addresses; blank entries are skipped
fn parse_trusted_proxies(value: &str) -> anyhow::Result<Vec<IpAddr>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid TRUSTED_PROXIES entry {entry:?}: {e}"))
        })
        .collect()
}
