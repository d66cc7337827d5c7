//! Client Validator
//!
//! One instance per process. Feature checks read the current state under
//! a short read lock and never wait on the network. Network checks are
//! single-flight: a caller arriving while a check runs waits for it and
//! returns its result instead of starting another.

use chrono::{DateTime, Utc};
use keycodec::{Operation, RejectionReason, ValidateRequest, ValidateResponse, redact_key};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cache::{CacheStore, ClientCache, Entitlement};
use crate::clock::{Clock, SystemClock};
use crate::config::ValidatorConfig;
use crate::error::{TransportError, ValidatorError, ValidatorResult};
use crate::instance;
use crate::state::ValidationState;
use crate::transport::{HttpTransport, ValidationTransport};

#[derive(Debug, Clone, Default)]
struct Snapshot {
    state: ValidationState,
    /// `None` means a check is due now
    next_check_at: Option<DateTime<Utc>>,
}

pub struct ClientValidator<T>
where
    T: ValidationTransport,
{
    config: ValidatorConfig,
    transport: T,
    cache: CacheStore,
    instance_id: String,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Snapshot>,
    in_flight: Mutex<()>,
    completed_checks: AtomicU64,
}

impl ClientValidator<HttpTransport> {
    /// Validator talking HTTPS to `config.server_url`
    pub fn from_config(config: ValidatorConfig) -> ValidatorResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::new(config, transport)
    }
}

impl<T> ClientValidator<T>
where
    T: ValidationTransport + Send + Sync,
{
    pub fn new(config: ValidatorConfig, transport: T) -> ValidatorResult<Self> {
        if config.max_attempts == 0 {
            return Err(ValidatorError::Config("max_attempts must be at least 1".into()));
        }
        let instance_id = instance::load_or_create(&config.data_dir)?;
        let cache = CacheStore::new(&config.data_dir);

        Ok(Self {
            config,
            transport,
            cache,
            instance_id,
            clock: Arc::new(SystemClock),
            snapshot: RwLock::new(Snapshot::default()),
            in_flight: Mutex::new(()),
            completed_checks: AtomicU64::new(0),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn state(&self) -> ValidationState {
        self.read_snapshot().state
    }

    pub fn next_check_at(&self) -> Option<DateTime<Utc>> {
        self.read_snapshot().next_check_at
    }

    /// Local feature check against the current state
    pub fn has_feature(&self, name: &str) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .has_feature(name)
    }

    /// Establish the initial state.
    ///
    /// A fresh cached entitlement for this key is used without any network
    /// call; otherwise a check runs now.
    pub async fn start(&self) -> ValidationState {
        if keycodec::decode(&self.config.license_key).is_err() {
            return self.reject_malformed();
        }

        let now = self.clock.now();
        let fresh = self
            .cached_for_key()
            .filter(|cache| now < cache.next_check_at)
            .and_then(|cache| usable(&cache, now).map(|e| (e, cache.next_check_at)));
        if let Some((entitlement, next_check_at)) = fresh {
            tracing::debug!(%next_check_at, "Using cached license entitlement");
            return self.set_state(ValidationState::Valid(entitlement), Some(next_check_at));
        }

        self.check_now().await
    }

    /// Validate against the service now (single-flight)
    pub async fn check_now(&self) -> ValidationState {
        let seen = self.completed_checks.load(Ordering::Acquire);
        let _guard = self.in_flight.lock().await;
        if self.completed_checks.load(Ordering::Acquire) != seen {
            // Another caller finished a check while we waited
            return self.state();
        }

        let state = self.run_check().await;
        self.completed_checks.fetch_add(1, Ordering::AcqRel);
        state
    }

    /// Start a background check if one is due and none is running
    pub fn refresh_if_due(self: &Arc<Self>) -> Option<JoinHandle<ValidationState>>
    where
        T: 'static,
    {
        let due = self
            .next_check_at()
            .is_none_or(|at| self.clock.now() >= at);
        if !due || self.in_flight.try_lock().is_err() {
            return None;
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.check_now().await }))
    }

    /// Release this installation's seat and forget the cached entitlement
    pub async fn deactivate(&self) -> ValidatorResult<bool> {
        let _guard = self.in_flight.lock().await;

        let response = self
            .with_retry(Operation::Deactivate, |request| async move {
                self.transport.deactivate(&request).await
            })
            .await?;
        if let Some(reason) = response.reason {
            return Err(ValidatorError::Rejected(reason));
        }

        self.cache.clear()?;
        self.set_state(ValidationState::Unchecked, None);
        self.completed_checks.fetch_add(1, Ordering::AcqRel);

        tracing::info!(
            instance_id = %self.instance_id,
            deactivated = response.deactivated,
            "License instance deactivated"
        );
        Ok(response.deactivated)
    }

    async fn run_check(&self) -> ValidationState {
        if keycodec::decode(&self.config.license_key).is_err() {
            return self.reject_malformed();
        }

        let result = self
            .with_retry(Operation::Validate, |request| async move {
                self.transport.validate(&request).await
            })
            .await;
        let now = self.clock.now();

        match result {
            Ok(response) if response.valid => match entitlement_from(response) {
                Some(entitlement) => self.accept(entitlement, now),
                None => self.fall_back(
                    TransportError::Decode("accepted response without entitlement".into()),
                    now,
                ),
            },
            Ok(response) => match response.reason {
                Some(reason) if reason.is_transient() => {
                    self.fall_back(TransportError::RateLimited, now)
                }
                reason => self.reject(reason, now),
            },
            Err(e) => self.fall_back(e, now),
        }
    }

    /// Call the service up to `max_attempts` times with exponential
    /// backoff, re-signing each attempt with a fresh timestamp
    async fn with_retry<R, F, Fut>(
        &self,
        operation: Operation,
        mut call: F,
    ) -> Result<R, TransportError>
    where
        F: FnMut(ValidateRequest) -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let mut attempt = 1;
        loop {
            match call(self.signed_request(operation)).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt >= self.config.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.config.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "License check failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn signed_request(&self, operation: Operation) -> ValidateRequest {
        ValidateRequest::signed(
            operation,
            self.config.license_key.trim(),
            &self.instance_id,
            &self.config.client_version,
            self.clock.now().timestamp(),
            self.config.client_secret.expose(),
        )
    }

    fn accept(&self, entitlement: Entitlement, now: DateTime<Utc>) -> ValidationState {
        let next_check_at = after(now, self.config.check_interval);
        self.write_cache(ClientCache {
            license_key: self.config.license_key.trim().to_string(),
            entitlement: Some(entitlement.clone()),
            reason: None,
            last_validated_at: now,
            next_check_at,
        });
        self.set_state(ValidationState::Valid(entitlement), Some(next_check_at))
    }

    /// Explicit rejections override the cache immediately
    fn reject(&self, reason: Option<RejectionReason>, now: DateTime<Utc>) -> ValidationState {
        tracing::warn!(
            license_key = %redact_key(&self.config.license_key),
            reason = ?reason,
            "License rejected by validation service"
        );
        let next_check_at = after(now, self.config.check_interval);
        self.write_cache(ClientCache {
            license_key: self.config.license_key.trim().to_string(),
            entitlement: None,
            reason,
            last_validated_at: now,
            next_check_at,
        });
        self.set_state(ValidationState::Invalid(reason), Some(next_check_at))
    }

    /// Connectivity failure: keep the cache, honor it within the grace period
    fn fall_back(&self, error: TransportError, now: DateTime<Utc>) -> ValidationState {
        let next_check_at = Some(after(now, self.config.retry_interval));
        let cache = self.cached_for_key();

        let state = match &cache {
            Some(cache)
                if now.signed_duration_since(cache.last_validated_at)
                    <= delta(self.config.grace_period) =>
            {
                match usable(cache, now) {
                    Some(entitlement) => ValidationState::Grace(entitlement),
                    None => ValidationState::Invalid(cache.reason),
                }
            }
            Some(cache) => ValidationState::Invalid(cache.reason),
            None => ValidationState::Invalid(None),
        };

        tracing::warn!(
            error = %error,
            state = state.name(),
            last_validated_at = ?cache.as_ref().map(|c| c.last_validated_at),
            "Validation service unreachable"
        );
        self.set_state(state, next_check_at)
    }

    fn reject_malformed(&self) -> ValidationState {
        tracing::warn!(
            license_key = %redact_key(&self.config.license_key),
            "License key is malformed"
        );
        self.set_state(ValidationState::Invalid(Some(RejectionReason::MalformedKey)), None)
    }

    fn cached_for_key(&self) -> Option<ClientCache> {
        self.cache
            .load()
            .filter(|cache| cache.license_key == self.config.license_key.trim())
    }

    fn write_cache(&self, cache: ClientCache) {
        if let Err(e) = self.cache.save(&cache) {
            tracing::warn!(error = %e, "Failed to write license cache");
        }
    }

    fn set_state(
        &self,
        state: ValidationState,
        next_check_at: Option<DateTime<Utc>>,
    ) -> ValidationState {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if snapshot.state.name() != state.name() {
            tracing::info!(
                from = snapshot.state.name(),
                to = state.name(),
                "License state changed"
            );
        }
        snapshot.state = state.clone();
        snapshot.next_check_at = next_check_at;
        state
    }

    fn read_snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Cached entitlement that has not expired
fn usable(cache: &ClientCache, now: DateTime<Utc>) -> Option<Entitlement> {
    cache
        .entitlement
        .as_ref()
        .filter(|e| !e.is_expired_at(now))
        .cloned()
}

fn entitlement_from(response: ValidateResponse) -> Option<Entitlement> {
    Some(Entitlement {
        tier: response.tier?,
        features: response.features.unwrap_or_default(),
        expires_at: response.expires_at?,
    })
}

fn delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// `now + duration`, saturating at the latest representable instant
fn after(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
