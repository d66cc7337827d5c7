//! Unit tests for the client validator
//!
//! A scripted transport stands in for the validation service and a
//! settable clock drives check intervals and the grace period.

#[cfg(test)]
mod support {
    use chrono::{DateTime, Duration as TimeDelta, NaiveDate, TimeZone, Utc};
    use keycodec::{DeactivateResponse, Tier, ValidateRequest, ValidateResponse};
    use platform::crypto::SecretBytes;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::clock::Clock;
    use crate::config::ValidatorConfig;
    use crate::error::TransportError;
    use crate::transport::ValidationTransport;
    use crate::validator::ClientValidator;

    pub const KEY_SECRET: &[u8] = b"deployment-key-secret";
    pub const CLIENT_SECRET: &[u8] = b"product-client-secret";

    pub struct FakeClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        pub fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        pub fn advance(&self, by: TimeDelta) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }

        pub fn set(&self, to: DateTime<Utc>) {
            *self.now.lock().unwrap() = to;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct Script {
        validations: Mutex<VecDeque<Result<ValidateResponse, TransportError>>>,
        deactivations: Mutex<VecDeque<Result<DeactivateResponse, TransportError>>>,
        requests: Mutex<Vec<ValidateRequest>>,
        calls: AtomicUsize,
    }

    /// Replays queued responses; an empty queue behaves like a network outage
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        script: Arc<Script>,
        delay: Duration,
    }

    impl FakeTransport {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn push(&self, response: Result<ValidateResponse, TransportError>) {
            self.script.validations.lock().unwrap().push_back(response);
        }

        pub fn push_deactivation(&self, response: Result<DeactivateResponse, TransportError>) {
            self.script.deactivations.lock().unwrap().push_back(response);
        }

        pub fn calls(&self) -> usize {
            self.script.calls.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<ValidateRequest> {
            self.script.requests.lock().unwrap().clone()
        }

        fn record(&self, request: &ValidateRequest) {
            self.script.calls.fetch_add(1, Ordering::SeqCst);
            self.script.requests.lock().unwrap().push(request.clone());
        }
    }

    impl ValidationTransport for FakeTransport {
        async fn validate(
            &self,
            request: &ValidateRequest,
        ) -> Result<ValidateResponse, TransportError> {
            self.record(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.validations.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(TransportError::Connect("offline".to_string())))
        }

        async fn deactivate(
            &self,
            request: &ValidateRequest,
        ) -> Result<DeactivateResponse, TransportError> {
            self.record(request);
            let next = self.script.deactivations.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(TransportError::Connect("offline".to_string())))
        }
    }

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn team_key() -> String {
        keycodec::encode(Tier::Team, "Acme", 10, 5, date(2026, 12, 31), KEY_SECRET).unwrap()
    }

    pub fn accepted() -> ValidateResponse {
        accepted_until(date(2026, 12, 31))
    }

    pub fn accepted_until(expires_at: NaiveDate) -> ValidateResponse {
        ValidateResponse::accepted(Tier::Team, vec!["jira-sync".to_string()], expires_at)
    }

    pub fn config(dir: &Path, key: &str) -> ValidatorConfig {
        ValidatorConfig::new(
            "https://licensing.test",
            key,
            SecretBytes::new(CLIENT_SECRET),
            "1.4.2",
        )
        .with_data_dir(dir)
        .with_backoff_base(Duration::ZERO)
    }

    pub fn validator_with(
        config: ValidatorConfig,
        transport: &FakeTransport,
        clock: &Arc<FakeClock>,
    ) -> ClientValidator<FakeTransport> {
        ClientValidator::new(config, transport.clone())
            .unwrap()
            .with_clock(clock.clone())
    }

    pub fn validator(
        dir: &Path,
        transport: &FakeTransport,
        clock: &Arc<FakeClock>,
    ) -> ClientValidator<FakeTransport> {
        validator_with(config(dir, &team_key()), transport, clock)
    }
}

#[cfg(test)]
mod startup_tests {
    use chrono::{DateTime, Utc};
    use keycodec::{Operation, RejectionReason};
    use std::time::Duration;

    use super::support::*;
    use crate::cache::CacheStore;
    use crate::error::ValidatorError;
    use crate::state::ValidationState;
    use crate::validator::ClientValidator;

    #[tokio::test]
    async fn test_first_validation_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));

        let validator = validator(dir.path(), &transport, &clock);
        let state = validator.start().await;

        assert!(matches!(state, ValidationState::Valid(_)));
        assert!(validator.has_feature("jira-sync"));
        assert!(!validator.has_feature("sso"));
        assert_eq!(transport.calls(), 1);

        let cache = CacheStore::new(dir.path()).load().unwrap();
        assert_eq!(cache.license_key, team_key());
        assert_eq!(cache.last_validated_at, t0());
        assert_eq!(cache.next_check_at, t0() + chrono::Duration::hours(24));
        assert!(cache.is_valid());
    }

    #[tokio::test]
    async fn test_requests_are_signed_with_instance_id() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;

        let requests = transport.requests();
        let request = &requests[0];
        assert_eq!(request.key, team_key());
        assert_eq!(request.instance_id, validator.instance_id());
        assert_eq!(request.version, "1.4.2");
        assert_eq!(request.timestamp, t0().timestamp());
        assert!(request.has_valid_signature(Operation::Validate, CLIENT_SECRET));
        assert!(!request.has_valid_signature(Operation::Deactivate, CLIENT_SECRET));
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));

        let first = validator(dir.path(), &transport, &clock);
        first.start().await;

        clock.advance(chrono::Duration::hours(23));
        let second = validator(dir.path(), &transport, &clock);
        let state = second.start().await;

        assert!(matches!(state, ValidationState::Valid(_)));
        assert_eq!(transport.calls(), 1);
        assert_eq!(second.instance_id(), first.instance_id());
        assert_eq!(
            second.next_check_at(),
            Some(t0() + chrono::Duration::hours(24))
        );
    }

    #[tokio::test]
    async fn test_due_cache_revalidates() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        transport.push(Ok(accepted()));

        validator(dir.path(), &transport, &clock).start().await;

        clock.advance(chrono::Duration::hours(25));
        let state = validator(dir.path(), &transport, &clock).start().await;

        assert!(matches!(state, ValidationState::Valid(_)));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_key_makes_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();

        let validator = validator_with(config(dir.path(), "SNOW-NOPE"), &transport, &clock);
        let state = validator.start().await;

        assert_eq!(
            state,
            ValidationState::Invalid(Some(RejectionReason::MalformedKey))
        );
        assert_eq!(transport.calls(), 0);

        let state = validator.check_now().await;
        assert_eq!(state.reason(), Some(RejectionReason::MalformedKey));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_for_another_key_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        validator(dir.path(), &transport, &clock).start().await;

        let other_key = keycodec::encode(
            keycodec::Tier::Professional,
            "Solo",
            1,
            1,
            date(2026, 12, 31),
            KEY_SECRET,
        )
        .unwrap();
        let other = validator_with(config(dir.path(), &other_key), &transport, &clock);

        assert_eq!(other.start().await, ValidationState::Invalid(None));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_unbounded_check_interval_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));

        let config =
            config(dir.path(), &team_key()).with_check_interval(Duration::from_secs(u64::MAX));
        let validator = validator_with(config, &transport, &clock);

        assert!(matches!(validator.start().await, ValidationState::Valid(_)));
        assert_eq!(validator.next_check_at(), Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), &team_key());
        config.max_attempts = 0;

        let result = ClientValidator::new(config, FakeTransport::default());
        assert!(matches!(result, Err(ValidatorError::Config(_))));
    }
}

#[cfg(test)]
mod offline_tests {
    use chrono::Duration as TimeDelta;
    use keycodec::{RejectionReason, ValidateResponse};
    use std::fs;

    use super::support::*;
    use crate::cache::CacheStore;
    use crate::error::TransportError;
    use crate::state::ValidationState;

    #[tokio::test]
    async fn test_grace_period_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;

        clock.set(t0() + TimeDelta::days(7) - TimeDelta::seconds(1));
        let state = validator.check_now().await;
        assert!(matches!(state, ValidationState::Grace(_)));
        assert!(validator.has_feature("jira-sync"));

        clock.set(t0() + TimeDelta::days(7) + TimeDelta::seconds(1));
        let state = validator.check_now().await;
        assert_eq!(state, ValidationState::Invalid(None));
        assert!(!validator.has_feature("jira-sync"));
    }

    #[tokio::test]
    async fn test_unbounded_retry_interval_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();

        let mut config = config(dir.path(), &team_key());
        config.retry_interval = std::time::Duration::MAX;
        let validator = validator_with(config, &transport, &clock);

        assert_eq!(validator.start().await, ValidationState::Invalid(None));
        assert_eq!(validator.next_check_at(), Some(chrono::DateTime::<chrono::Utc>::MAX_UTC));
    }

    #[tokio::test]
    async fn test_outage_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;
        let store = CacheStore::new(dir.path());
        let before = fs::read(store.path()).unwrap();

        clock.advance(TimeDelta::days(2));
        let state = validator.check_now().await;

        assert!(matches!(state, ValidationState::Grace(_)));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(
            validator.next_check_at(),
            Some(t0() + TimeDelta::days(2) + TimeDelta::minutes(15))
        );
    }

    #[tokio::test]
    async fn test_retries_until_third_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Err(TransportError::Timeout));
        transport.push(Err(TransportError::Status(503)));
        transport.push(Ok(accepted()));

        let validator = validator(dir.path(), &transport, &clock);
        let state = validator.start().await;

        assert!(matches!(state, ValidationState::Valid(_)));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();

        let validator = validator(dir.path(), &transport, &clock);
        let state = validator.start().await;

        assert_eq!(state, ValidationState::Invalid(None));
        assert_eq!(transport.calls(), 3);
        assert!(CacheStore::new(dir.path()).load().is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_falls_back_to_grace() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        transport.push(Ok(ValidateResponse::rejected(RejectionReason::RateLimited)));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;

        clock.advance(TimeDelta::hours(25));
        let state = validator.check_now().await;

        assert!(matches!(state, ValidationState::Grace(_)));
        let cache = CacheStore::new(dir.path()).load().unwrap();
        assert_eq!(cache.last_validated_at, t0());
        assert!(cache.is_valid());
    }

    #[tokio::test]
    async fn test_rejection_overrides_cache() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        transport.push(Ok(ValidateResponse::rejected(RejectionReason::LicenseRevoked)));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;

        clock.advance(TimeDelta::hours(1));
        let state = validator.check_now().await;
        assert_eq!(
            state,
            ValidationState::Invalid(Some(RejectionReason::LicenseRevoked))
        );
        assert!(!validator.has_feature("jira-sync"));

        let cache = CacheStore::new(dir.path()).load().unwrap();
        assert!(cache.entitlement.is_none());
        assert_eq!(cache.reason, Some(RejectionReason::LicenseRevoked));

        // An outage afterwards does not resurrect the old entitlement
        let state = validator.check_now().await;
        assert_eq!(state.reason(), Some(RejectionReason::LicenseRevoked));
    }

    #[tokio::test]
    async fn test_expired_entitlement_is_not_honored() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted_until(date(2026, 6, 2))));

        let config = config(dir.path(), &team_key())
            .with_check_interval(std::time::Duration::from_secs(30 * 86_400));
        validator_with(config.clone(), &transport, &clock).start().await;

        clock.advance(TimeDelta::days(2));
        let validator = validator_with(config, &transport, &clock);
        let state = validator.start().await;

        assert_eq!(state, ValidationState::Invalid(None));
        assert_eq!(transport.calls(), 4);
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use chrono::Duration as TimeDelta;
    use keycodec::{DeactivateResponse, Operation, RejectionReason};
    use std::sync::Arc;
    use std::time::Duration;

    use super::support::*;
    use crate::cache::CacheStore;
    use crate::error::ValidatorError;
    use crate::state::ValidationState;

    #[tokio::test]
    async fn test_concurrent_checks_share_one_request() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::with_delay(Duration::from_millis(50));
        transport.push(Ok(accepted()));
        transport.push(Ok(accepted()));

        let validator = validator(dir.path(), &transport, &clock);
        let (first, second) = tokio::join!(validator.check_now(), validator.check_now());

        assert!(matches!(first, ValidationState::Valid(_)));
        assert_eq!(first, second);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_runs_only_when_due() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        transport.push(Ok(accepted()));

        let validator = Arc::new(validator(dir.path(), &transport, &clock));

        let handle = validator.refresh_if_due().expect("unchecked validator is due");
        assert!(matches!(handle.await.unwrap(), ValidationState::Valid(_)));
        assert!(validator.refresh_if_due().is_none());

        clock.advance(TimeDelta::hours(24));
        let handle = validator.refresh_if_due().expect("check interval elapsed");
        handle.await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_deactivate_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        transport.push_deactivation(Ok(DeactivateResponse {
            deactivated: true,
            reason: None,
        }));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;

        assert!(validator.deactivate().await.unwrap());
        assert_eq!(validator.state(), ValidationState::Unchecked);
        assert!(CacheStore::new(dir.path()).load().is_none());
        let requests = transport.requests();
        assert!(requests[1].has_valid_signature(Operation::Deactivate, CLIENT_SECRET));
        assert!(!requests[1].has_valid_signature(Operation::Validate, CLIENT_SECRET));
    }

    #[tokio::test]
    async fn test_deactivate_rejection_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::at(t0());
        let transport = FakeTransport::default();
        transport.push(Ok(accepted()));
        transport.push_deactivation(Ok(DeactivateResponse {
            deactivated: false,
            reason: Some(RejectionReason::InvalidSignature),
        }));

        let validator = validator(dir.path(), &transport, &clock);
        validator.start().await;

        let result = validator.deactivate().await;
        assert!(matches!(
            result,
            Err(ValidatorError::Rejected(RejectionReason::InvalidSignature))
        ));
        assert!(matches!(validator.state(), ValidationState::Valid(_)));
        assert!(CacheStore::new(dir.path()).load().is_some());
    }
}
