//! Gateway error taxonomy and rejection reason tags.
//!
//! Every request failure resolves to one [`GatewayError`] variant, which in
//! turn maps to exactly one status code and one [`RejectReason`] used for
//! metrics attribution.

use std::fmt;

use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::routing::{RouteError, RouteSourceError};
use crate::security::token::AuthError;

/// Categorical tag attached to a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    IpFilter,
    TokenValidation,
    RateLimit,
    InvalidRequest,
    Other,
}

impl RejectReason {
    pub const ALL: [RejectReason; 5] = [
        RejectReason::IpFilter,
        RejectReason::TokenValidation,
        RejectReason::RateLimit,
        RejectReason::InvalidRequest,
        RejectReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::IpFilter => "IP Filter",
            RejectReason::TokenValidation => "Token Validation",
            RejectReason::RateLimit => "Rate Limit",
            RejectReason::InvalidRequest => "Invalid Request",
            RejectReason::Other => "Other",
        }
    }

    /// Reason for an error status that no gateway filter produced,
    /// e.g. one returned by the backend.
    pub fn from_status(status: u16) -> Self {
        match status {
            403 => RejectReason::IpFilter,
            401 => RejectReason::TokenValidation,
            429 => RejectReason::RateLimit,
            400 | 404 | 405 => RejectReason::InvalidRequest,
            _ => RejectReason::Other,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RejectReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Errors surfaced by the gateway request path and its background tasks.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed route definition; skipped at table build time.
    #[error("configuration error: {0}")]
    Configuration(#[from] RouteError),

    /// Missing, invalid or expired bearer token.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Client IP not on the route's allow list.
    #[error("client {client_ip} is not allowed")]
    Authorization { client_ip: String },

    /// Rate limit window exhausted.
    #[error("rate limit exceeded, retry after {retry_after_ms}ms")]
    RateExceeded { retry_after_ms: u64 },

    /// No route predicate matches the path.
    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    /// No route table was ever loaded.
    #[error("route table not yet available")]
    TableUnavailable,

    /// The route source could not be read.
    #[error("route source fetch failed: {0}")]
    SourceFetch(#[from] RouteSourceError),

    /// The backend could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The backend did not answer in time.
    #[error("upstream timed out")]
    UpstreamTimeout,
}

impl GatewayError {
    /// Status code returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Authorization { .. } => StatusCode::FORBIDDEN,
            GatewayError::RateExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::TableUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Configuration(_) | GatewayError::SourceFetch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Reason tag recorded for metrics.
    pub fn reason(&self) -> RejectReason {
        match self {
            GatewayError::Authentication(_) => RejectReason::TokenValidation,
            GatewayError::Authorization { .. } => RejectReason::IpFilter,
            GatewayError::RateExceeded { .. } => RejectReason::RateLimit,
            GatewayError::RouteNotFound { .. } | GatewayError::TableUnavailable => {
                RejectReason::InvalidRequest
            }
            _ => RejectReason::Other,
        }
    }

    /// Client-facing message. Never includes internal detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::Authentication(AuthError::Missing) => "Missing bearer token",
            GatewayError::Authentication(_) => "Invalid or expired token",
            GatewayError::Authorization { .. } => "Client IP not allowed",
            GatewayError::RateExceeded { .. } => "Rate limit exceeded",
            GatewayError::RouteNotFound { .. } => "No matching route found",
            GatewayError::TableUnavailable => "Routes not yet available",
            GatewayError::UpstreamUnavailable(_) => "Upstream request failed",
            GatewayError::UpstreamTimeout => "Upstream request timed out",
            GatewayError::Configuration(_) | GatewayError::SourceFetch(_) => {
                "Internal gateway error"
            }
        }
    }
}
