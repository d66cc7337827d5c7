//! Client identification utilities
//!
//! Source address extraction used for rate limiting and the audit log.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Extract the client IP address for a request
///
/// Forwarding headers are honored only when the connecting peer is one of
/// `trusted_proxies`: `X-Forwarded-For` first, then `X-Real-IP`. Any other
/// peer is identified by its own address, whatever headers it sends.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `peer_ip` - Address of the direct connection
/// * `trusted_proxies` - Reverse proxies allowed to report the client address
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let behind_proxy = peer_ip.is_some_and(|ip| trusted_proxies.contains(&ip));
    if !behind_proxy {
        return peer_ip;
    }

    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = real.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }
    peer_ip
}

/// Rate-limit / audit key for an address; unknown peers share one bucket
pub fn source_key(ip: Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
