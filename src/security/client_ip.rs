//! Client IP resolution.
//!
//! # Responsibilities
//! - Pick the client address from proxy headers in a fixed precedence order
//! - Fall back to the transport peer address
//! - Normalize loopback spellings so allow lists can use one form
//!
//! # Design Decisions
//! - First non-empty, non-"unknown" value wins; only the first entry of a
//!   comma-separated chain is used (the originating client)
//! - Header names are configurable; order is the configured order

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::config::ClientIpConfig;

const LOOPBACK_FORMS: [&str; 3] = ["::1", "0:0:0:0:0:0:0:1", "localhost"];

/// Placeholder used when neither headers nor a peer address are available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Map loopback spellings to `127.0.0.1`; other values are returned trimmed.
pub fn normalize_ip(raw: &str) -> String {
    let ip = raw.trim();
    if LOOPBACK_FORMS.iter().any(|form| ip.eq_ignore_ascii_case(form)) {
        "127.0.0.1".to_string()
    } else {
        ip.to_string()
    }
}

/// Resolves the client address of a request.
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    headers: Vec<String>,
}

impl Default for ClientIpResolver {
    fn default() -> Self {
        Self::new(&ClientIpConfig::default())
    }
}

impl ClientIpResolver {
    pub fn new(config: &ClientIpConfig) -> Self {
        Self {
            headers: config.headers.clone(),
        }
    }

    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        for name in &self.headers {
            let Some(value) = headers.get(name.as_str()).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            let first = value.split(',').next().unwrap_or_default().trim();
            if !first.is_empty() && !first.eq_ignore_ascii_case(UNKNOWN_CLIENT) {
                return normalize_ip(first);
            }
        }

        match peer {
            Some(addr) => normalize_ip(&addr.ip().to_string()),
            None => UNKNOWN_CLIENT.to_string(),
        }
    }
}
