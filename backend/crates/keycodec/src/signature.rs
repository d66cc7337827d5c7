//! Validation request signing.
//!
//! Both sides hold a shared `client_secret` baked into the product build.
//! Each license gets its own signing key, `HMAC-SHA256(client_secret, key)`,
//! so a signature made for one license never verifies for another.
//! The signature is lowercase hex of `HMAC-SHA256(signing_key, canonical)`
//! where `canonical` joins the operation, key, instance ID, version and
//! timestamp with `\n`. The operation tag keeps a body signed for
//! `/validate` from being accepted by `/deactivate`.

use platform::crypto::{constant_time_eq, hmac_sha256, hmac_sha256_hex};

/// Maximum accepted distance between request and server clocks
pub const REPLAY_WINDOW_SECS: i64 = 300;

/// Endpoint a signature authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Validate,
    Deactivate,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Deactivate => "deactivate",
        }
    }
}

/// The fields covered by a request signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedFields<'a> {
    pub operation: Operation,
    pub key: &'a str,
    pub instance_id: &'a str,
    pub version: &'a str,
    /// Unix seconds
    pub timestamp: i64,
}

impl SignedFields<'_> {
    pub fn canonical(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            self.operation.as_str(),
            self.key,
            self.instance_id,
            self.version,
            self.timestamp
        )
    }

    pub fn sign(&self, client_secret: &[u8]) -> String {
        let signing_key = signing_key(client_secret, self.key);
        hmac_sha256_hex(&signing_key, self.canonical().as_bytes())
    }

    /// Constant-time check of a hex signature (case-insensitive)
    pub fn verify(&self, client_secret: &[u8], signature: &str) -> bool {
        let expected = self.sign(client_secret);
        let provided = signature.trim().to_ascii_lowercase();
        constant_time_eq(expected.as_bytes(), provided.as_bytes())
    }
}

/// Per-license signing key
pub fn signing_key(client_secret: &[u8], license_key: &str) -> [u8; 32] {
    hmac_sha256(client_secret, license_key.as_bytes())
}

/// Whether `request_ts` lies within `window_secs` of `server_ts` (either direction)
pub fn within_replay_window(request_ts: i64, server_ts: i64, window_secs: i64) -> bool {
    request_ts.abs_diff(server_ts) <= window_secs.unsigned_abs()
}
