//! Client validator configuration

use platform::crypto::SecretBytes;
use std::path::PathBuf;
use std::time::Duration;

const DATA_DIR_NAME: &str = "snow-flow";

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Base URL of the validation service, e.g. `https://licensing.example.com`
    pub server_url: String,
    pub license_key: String,
    /// Shared signing secret baked into the product build
    pub client_secret: SecretBytes,
    pub client_version: String,
    /// Holds the instance ID and the license cache
    pub data_dir: PathBuf,
    /// How long a successful validation is trusted without asking again
    pub check_interval: Duration,
    /// How long a cached entitlement survives connectivity failures
    pub grace_period: Duration,
    /// Next attempt after the service could not be reached
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub backoff_base: Duration,
}

impl ValidatorConfig {
    pub fn new(
        server_url: impl Into<String>,
        license_key: impl Into<String>,
        client_secret: SecretBytes,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            license_key: license_key.into(),
            client_secret,
            client_version: client_version.into(),
            data_dir: default_data_dir(),
            check_interval: Duration::from_secs(24 * 60 * 60),
            grace_period: Duration::from_secs(7 * 24 * 60 * 60),
            retry_interval: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, …
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }

    pub fn validate_url(&self) -> String {
        format!("{}/validate", self.server_url.trim_end_matches('/'))
    }

    pub fn deactivate_url(&self) -> String {
        format!("{}/deactivate", self.server_url.trim_end_matches('/'))
    }
}

/// `<local data dir>/snow-flow`, or `./.snow-flow` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{DATA_DIR_NAME}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ValidatorConfig {
        ValidatorConfig::new(
            "https://licensing.example.com/",
            "SNOW-KEY",
            SecretBytes::from("secret"),
            "1.0.0",
        )
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.check_interval, Duration::from_secs(86_400));
        assert_eq!(config.grace_period, Duration::from_secs(604_800));
        assert_eq!(config.retry_interval, Duration::from_secs(900));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_attempts, 3);
        assert!(config.data_dir.ends_with(DATA_DIR_NAME) || config.data_dir.ends_with(".snow-flow"));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = config();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = config();
        assert_eq!(config.validate_url(), "https://licensing.example.com/validate");
        assert_eq!(config.deactivate_url(), "https://licensing.example.com/deactivate");
    }
}
