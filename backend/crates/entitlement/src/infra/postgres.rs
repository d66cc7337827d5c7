//! PostgreSQL Repository Implementations

use chrono::{DateTime, NaiveDate, Utc};
use keycodec::{InstanceLimit, SeatCount, Seats, Tier};
use platform::rate_limit::{
    RateLimitConfig, RateLimitError, RateLimitResult, RateLimitStore, evaluate,
};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::entities::{License, LicenseInstance, ValidationLogEntry};
use crate::domain::repository::{InstanceRepository, LicenseRepository, ValidationLogRepository};
use crate::domain::value_objects::{InstanceDecision, LicenseStatus};
use crate::error::{LicensingError, LicensingResult};

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgLicenseRepository {
    pool: PgPool,
}

impl PgLicenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove rate-limit buckets older than two windows
    pub async fn cleanup_expired(&self, rate_limit_window: Duration) -> LicensingResult<u64> {
        let window_ms = rate_limit_window.as_millis() as i64;
        let horizon_ms = Utc::now().timestamp_millis() - 2 * window_ms;

        let rate_limits_deleted =
            sqlx::query("DELETE FROM rate_limit_buckets WHERE bucket_start_ms < $1")
                .bind(horizon_ms)
                .execute(&self.pool)
                .await?
                .rows_affected();

        tracing::info!(
            rate_limits = rate_limits_deleted,
            "Cleaned up expired rate-limit buckets"
        );

        Ok(rate_limits_deleted)
    }
}

impl LicenseRepository for PgLicenseRepository {
    async fn get_license(&self, key: &str) -> LicensingResult<Option<License>> {
        let row = sqlx::query_as::<_, LicenseRow>(
            r#"
            SELECT
                license_key,
                tier,
                organization,
                developer_seats,
                stakeholder_seats,
                expires_at,
                instance_limit,
                license_status,
                created_at
            FROM licenses
            WHERE license_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LicenseRow::into_license).transpose()
    }

    async fn insert_license(&self, license: &License) -> LicensingResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO licenses (
                license_key,
                tier,
                organization,
                developer_seats,
                stakeholder_seats,
                expires_at,
                instance_limit,
                license_status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (license_key) DO NOTHING
            "#,
        )
        .bind(&license.key)
        .bind(license.tier.code())
        .bind(&license.organization)
        .bind(license.seats.map(|s| s.developer.get()))
        .bind(license.seats.map(|s| s.stakeholder.get()))
        .bind(license.expires_at)
        .bind(license.instance_limit.to_db())
        .bind(license.status.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LicensingError::LicenseExists);
        }
        Ok(())
    }

    async fn set_license_status(
        &self,
        key: &str,
        status: LicenseStatus,
    ) -> LicensingResult<bool> {
        let result = sqlx::query(
            "UPDATE licenses SET license_status = $2, updated_at = now() WHERE license_key = $1",
        )
        .bind(key)
        .bind(status.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl InstanceRepository for PgLicenseRepository {
    async fn upsert_instance(
        &self,
        key: &str,
        instance_id: &str,
        client_version: &str,
        now: DateTime<Utc>,
    ) -> LicensingResult<InstanceDecision> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the license serializes activations for this key only
        let limit = sqlx::query_scalar::<_, i32>(
            "SELECT instance_limit FROM licenses WHERE license_key = $1 FOR UPDATE",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?
        .map(InstanceLimit::from_db)
        .ok_or(LicensingError::LicenseNotFound)?;

        let renewed = sqlx::query(
            r#"
            UPDATE license_instances
            SET last_seen_at = $3, client_version = $4
            WHERE license_key = $1 AND instance_id = $2
            "#,
        )
        .bind(key)
        .bind(instance_id)
        .bind(now)
        .bind(client_version)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if renewed {
            tx.commit().await?;
            return Ok(InstanceDecision::Renewed);
        }

        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM license_instances WHERE license_key = $1",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        if !limit.admits(active as u64) {
            tx.rollback().await?;
            tracing::warn!(active, limit = limit.to_db(), "Instance limit reached");
            return Ok(InstanceDecision::LimitExceeded);
        }

        let instance = LicenseInstance::new(key, instance_id, client_version, now);
        sqlx::query(
            r#"
            INSERT INTO license_instances (
                license_instance_id,
                license_key,
                instance_id,
                client_version,
                first_seen_at,
                last_seen_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(instance.id.into_uuid())
        .bind(&instance.license_key)
        .bind(&instance.instance_id)
        .bind(&instance.client_version)
        .bind(instance.first_seen_at)
        .bind(instance.last_seen_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InstanceDecision::Activated)
    }

    async fn deactivate_instance(&self, key: &str, instance_id: &str) -> LicensingResult<bool> {
        let deleted = sqlx::query(
            "DELETE FROM license_instances WHERE license_key = $1 AND instance_id = $2",
        )
        .bind(key)
        .bind(instance_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted > 0)
    }

    async fn list_instances(&self, key: &str) -> LicensingResult<Vec<LicenseInstance>> {
        let rows = sqlx::query_as::<_, LicenseInstanceRow>(
            r#"
            SELECT
                license_instance_id,
                license_key,
                instance_id,
                client_version,
                first_seen_at,
                last_seen_at
            FROM license_instances
            WHERE license_key = $1
            ORDER BY first_seen_at
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LicenseInstanceRow::into_instance).collect())
    }

    async fn reap_stale_instances(&self, older_than: DateTime<Utc>) -> LicensingResult<u64> {
        let reaped = sqlx::query("DELETE FROM license_instances WHERE last_seen_at < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(reaped, "Reaped stale license instances");
        Ok(reaped)
    }
}

impl ValidationLogRepository for PgLicenseRepository {
    async fn append_log(&self, entry: &ValidationLogEntry) -> LicensingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO validation_log (
                validation_log_id,
                license_key,
                instance_id,
                client_version,
                outcome,
                source_ip,
                logged_at
            ) VALUES ($1, $2, $3, $4, $5, $6::inet, $7)
            "#,
        )
        .bind(entry.id.into_uuid())
        .bind(&entry.license_key)
        .bind(&entry.instance_id)
        .bind(&entry.client_version)
        .bind(entry.outcome.code())
        .bind(entry.source_ip.as_ref().map(|ip| ip.to_string()))
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl RateLimitStore for PgLicenseRepository {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let bucket_start = config.bucket_start(now_ms);
        let previous_start = bucket_start - config.window_ms();

        let (current, previous) = sqlx::query_as::<_, (i32, i32)>(
            r#"
            WITH current_bucket AS (
                INSERT INTO rate_limit_buckets (source_key, bucket_start_ms, request_count)
                VALUES ($1, $2, 1)
                ON CONFLICT (source_key, bucket_start_ms)
                DO UPDATE SET request_count = rate_limit_buckets.request_count + 1
                RETURNING request_count
            )
            SELECT
                (SELECT request_count FROM current_bucket),
                COALESCE(
                    (SELECT request_count FROM rate_limit_buckets
                     WHERE source_key = $1 AND bucket_start_ms = $3),
                    0
                )
            "#,
        )
        .bind(key)
        .bind(bucket_start)
        .bind(previous_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RateLimitError(Box::new(e)))?;

        Ok(evaluate(
            config,
            previous.max(0) as u32,
            current.max(0) as u32,
            now_ms,
        ))
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct LicenseRow {
    license_key: String,
    tier: String,
    organization: String,
    developer_seats: Option<i32>,
    stakeholder_seats: Option<i32>,
    expires_at: NaiveDate,
    instance_limit: i32,
    license_status: i16,
    created_at: DateTime<Utc>,
}

impl LicenseRow {
    fn into_license(self) -> LicensingResult<License> {
        let tier = Tier::from_code(&self.tier)
            .ok_or_else(|| LicensingError::Internal(format!("unknown tier `{}`", self.tier)))?;
        let status = LicenseStatus::from_id(self.license_status).ok_or_else(|| {
            LicensingError::Internal(format!("unknown license status {}", self.license_status))
        })?;
        let seats = match (self.developer_seats, self.stakeholder_seats) {
            (Some(dev), Some(stake)) => Some(Seats::new(
                SeatCount::new(dev)?,
                SeatCount::new(stake)?,
            )),
            _ => None,
        };

        Ok(License {
            key: self.license_key,
            tier,
            organization: self.organization,
            seats,
            expires_at: self.expires_at,
            instance_limit: InstanceLimit::from_db(self.instance_limit),
            status,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LicenseInstanceRow {
    license_instance_id: Uuid,
    license_key: String,
    instance_id: String,
    client_version: String,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl LicenseInstanceRow {
    fn into_instance(self) -> LicenseInstance {
        LicenseInstance {
            id: self.license_instance_id.into(),
            license_key: self.license_key,
            instance_id: self.instance_id,
            client_version: self.client_version,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
        }
    }
}
