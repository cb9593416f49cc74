//! Client Key Module
//!
//! Derives the identifier rate-limit windows are keyed by. The key pairs
//! the client's IP with a bounded hash of its user agent, so distinct
//! programs behind one NAT address get separate windows without the key
//! space exploding.

use std::net::IpAddr;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// User-agent hashes are folded into this many buckets.
const UA_HASH_BUCKETS: u64 = 10_000;

// == Key Derivation ==
/// Derives the rate-limit key for a request.
///
/// The client IP is taken from the first hop of `X-Forwarded-For` when
/// present, then `X-Real-IP`, then the peer address, then the literal
/// `unknown`. Proxies in front of the service are trusted to set the
/// forwarding headers honestly.
pub fn derive_client_key(headers: &HeaderMap, peer_ip: Option<IpAddr>) -> String {
    let forwarded_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty());

    let client_ip = forwarded_ip
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        })
        .or_else(|| peer_ip.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    format!("{client_ip}:{}", bounded_hash(user_agent))
}

/// Stable hash of `input` in `0..UA_HASH_BUCKETS`.
///
/// SHA-256 rather than the stdlib hasher: keys must agree across
/// processes and restarts, since the windows live in a shared store.
fn bounded_hash(input: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % UA_HASH_BUCKETS
}
