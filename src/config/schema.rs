//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::RouteSpec;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Route table refresh schedule.
    pub refresh: RefreshConfig,

    /// Where route definitions are fetched from.
    pub route_source: RouteSourceConfig,

    /// Rate limiter defaults and sweep schedule.
    pub rate_limit: RateLimitConfig,

    /// Metrics collector retention settings.
    pub metrics: MetricsConfig,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Client IP resolution.
    pub client_ip: ClientIpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Inline route definitions, used when `route_source.kind = "inline"`.
    pub routes: Vec<RouteSpec>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a request, including the upstream call, in seconds.
    pub request_secs: u64,

    /// Upstream response timeout in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 25,
        }
    }
}

/// Route table refresh schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Interval between scheduled reloads in seconds.
    pub interval_secs: u64,

    /// Reload when the route file changes (file source only).
    pub watch_file: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 45,
            watch_file: true,
        }
    }
}

/// Kind of route source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteSourceKind {
    /// Routes from the `[[routes]]` section of this config.
    #[default]
    Inline,
    /// Routes from a separate TOML or JSON file.
    File,
    /// Routes fetched as JSON from an HTTP endpoint.
    Http,
}

/// Route source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteSourceConfig {
    pub kind: RouteSourceKind,

    /// Route file path (file source).
    pub path: Option<String>,

    /// Endpoint returning a JSON array of routes (http source).
    pub url: Option<String>,

    /// Fetch timeout in milliseconds (http source).
    pub timeout_ms: u64,
}

impl Default for RouteSourceConfig {
    fn default() -> Self {
        Self {
            kind: RouteSourceKind::Inline,
            path: None,
            url: None,
            timeout_ms: 5000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Limit applied when a route enables rate limiting without its own limit.
    pub default_max_requests: u32,

    /// Window applied alongside `default_max_requests`, in milliseconds.
    pub default_window_ms: u64,

    /// How often idle windows are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Idle time after which an expired window is removed, in seconds.
    pub idle_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_max_requests: 10,
            default_window_ms: 60_000,
            sweep_interval_secs: 60,
            idle_ttl_secs: 300,
        }
    }
}

/// Metrics collector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Retention of per-second buckets in seconds.
    pub raw_retention_secs: u64,

    /// Retention of per-minute rollups in days.
    pub series_retention_days: u64,

    /// Response-time samples kept per route.
    pub response_time_samples: usize,

    /// Minutes of history included in route snapshots.
    pub history_minutes: u64,

    /// Bucket sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            raw_retention_secs: 120,
            series_retention_days: 7,
            response_time_samples: 1000,
            history_minutes: 30,
            sweep_interval_secs: 30,
        }
    }
}

/// Token verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Local HMAC-signed JWT verification.
    #[default]
    Jwt,
    /// Remote token introspection.
    Introspection,
}

/// Bearer token verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,

    /// Shared HMAC secret for JWT verification.
    pub jwt_secret: String,

    /// JWT algorithm: HS256, HS384 or HS512.
    pub algorithm: String,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any.
    pub audience: Option<String>,

    /// Clock skew tolerance for `exp` in seconds.
    pub leeway_secs: u64,

    /// Introspection endpoint (introspection mode).
    pub introspection_url: Option<String>,

    /// Upper bound on a single verification in milliseconds.
    pub verify_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Jwt,
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            algorithm: "HS256".to_string(),
            issuer: None,
            audience: None,
            leeway_secs: 30,
            introspection_url: None,
            verify_timeout_ms: 2000,
        }
    }
}

/// Client IP resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientIpConfig {
    /// Proxy headers checked in order before the peer address.
    pub headers: Vec<String>,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            headers: [
                "X-Forwarded-For",
                "X-Real-IP",
                "Proxy-Client-IP",
                "WL-Proxy-Client-IP",
                "HTTP_CLIENT_IP",
                "HTTP_X_FORWARDED_FOR",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
