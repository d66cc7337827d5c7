//! Licensing service configuration

use platform::crypto::SecretBytes;
use platform::rate_limit::RateLimitConfig;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LicensingConfig {
    /// Secret behind key checksums
    pub key_secret: SecretBytes,
    /// Secret shared with product builds for request signatures
    pub client_secret: SecretBytes,
    /// Accepted distance between request timestamp and server clock
    pub replay_window: Duration,
    /// Rate limit: max requests per window and source address
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    /// Reap instances unseen for this long at startup; `None` keeps them
    /// until deactivated
    pub instance_reap_after: Option<Duration>,
    /// Reverse proxies whose forwarding headers name the client address
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            key_secret: SecretBytes::new(Vec::new()),
            client_secret: SecretBytes::new(Vec::new()),
            replay_window: Duration::from_secs(keycodec::signature::REPLAY_WINDOW_SECS as u64),
            rate_limit_max_requests: 30,
            rate_limit_window: Duration::from_secs(60),
            instance_reap_after: None,
            trusted_proxies: Vec::new(),
        }
    }
}

impl LicensingConfig {
    /// Config with random secrets (for development)
    pub fn with_random_secret() -> Self {
        Self {
            key_secret: SecretBytes::random(32),
            client_secret: SecretBytes::random(32),
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self::with_random_secret()
    }

    /// Both secrets are present
    pub fn has_secrets(&self) -> bool {
        !self.key_secret.is_empty() && !self.client_secret.is_empty()
    }

    pub fn replay_window_secs(&self) -> i64 {
        self.replay_window.as_secs() as i64
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max_requests,
            window: self.rate_limit_window,
        }
    }

    pub fn rate_limit_window_ms(&self) -> i64 {
        self.rate_limit_window.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LicensingConfig::default();
        assert_eq!(config.replay_window_secs(), 300);
        assert_eq!(config.rate_limit_max_requests, 30);
        assert_eq!(config.rate_limit_window_ms(), 60_000);
        assert!(config.instance_reap_after.is_none());
        assert!(config.trusted_proxies.is_empty());
        assert!(!config.has_secrets());
    }

    #[test]
    fn test_random_secrets_differ() {
        let a = LicensingConfig::with_random_secret();
        let b = LicensingConfig::with_random_secret();
        assert!(a.has_secrets());
        assert_ne!(a.key_secret.expose(), b.key_secret.expose());
        assert_ne!(a.key_secret.expose(), a.client_secret.expose());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = LicensingConfig::development();
        let debug = format!("{config:?}");
        assert!(debug.contains("REDACTED"));
    }
}
