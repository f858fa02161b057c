//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Check that the selected route source and auth mode are fully configured
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Individual malformed routes are not config errors; the route table
//!   skips them at build time

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AuthMode, GatewayConfig, RouteSourceKind};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_IN_PRODUCTION";

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be > 0"));
    }
    if config.refresh.interval_secs == 0 {
        errors.push(ValidationError::new("refresh.interval_secs", "must be > 0"));
    }

    match config.route_source.kind {
        RouteSourceKind::Inline => {}
        RouteSourceKind::File => {
            if config.route_source.path.as_deref().map_or(true, str::is_empty) {
                errors.push(ValidationError::new(
                    "route_source.path",
                    "required when kind = \"file\"",
                ));
            }
        }
        RouteSourceKind::Http => match config.route_source.url.as_deref() {
            None | Some("") => errors.push(ValidationError::new(
                "route_source.url",
                "required when kind = \"http\"",
            )),
            Some(raw) => {
                if url::Url::parse(raw).is_err() {
                    errors.push(ValidationError::new(
                        "route_source.url",
                        format!("invalid URL '{raw}'"),
                    ));
                }
            }
        },
    }

    if config.rate_limit.default_max_requests == 0 {
        errors.push(ValidationError::new(
            "rate_limit.default_max_requests",
            "must be > 0",
        ));
    }
    if config.rate_limit.default_window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.default_window_ms", "must be > 0"));
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be > 0",
        ));
    }

    if config.metrics.response_time_samples == 0 {
        errors.push(ValidationError::new(
            "metrics.response_time_samples",
            "must be > 0",
        ));
    }
    // Current-vs-previous minute is derived from raw buckets.
    if config.metrics.raw_retention_secs < 120 {
        errors.push(ValidationError::new(
            "metrics.raw_retention_secs",
            "must be >= 120",
        ));
    }
    if config.metrics.series_retention_days == 0 {
        errors.push(ValidationError::new(
            "metrics.series_retention_days",
            "must be > 0",
        ));
    }
    if config.metrics.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("metrics.sweep_interval_secs", "must be > 0"));
    }

    if config.auth.verify_timeout_ms == 0 {
        errors.push(ValidationError::new("auth.verify_timeout_ms", "must be > 0"));
    }
    match config.auth.mode {
        AuthMode::Jwt => {
            if config.auth.jwt_secret.is_empty() {
                errors.push(ValidationError::new("auth.jwt_secret", "must not be empty"));
            }
            if !matches!(config.auth.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
                errors.push(ValidationError::new(
                    "auth.algorithm",
                    format!("unsupported algorithm '{}'", config.auth.algorithm),
                ));
            }
        }
        AuthMode::Introspection => match config.auth.introspection_url.as_deref() {
            Some(raw) if url::Url::parse(raw).is_ok() => {}
            _ => errors.push(ValidationError::new(
                "auth.introspection_url",
                "a valid URL is required when mode = \"introspection\"",
            )),
        },
    }

    if config.client_ip.headers.iter().any(|h| h.trim().is_empty()) {
        errors.push(ValidationError::new("client_ip.headers", "contains an empty header name"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "must be \"pretty\" or \"json\"",
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_SECRET {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address '{}'", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
