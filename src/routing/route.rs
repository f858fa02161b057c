//! Route definitions.
//!
//! `RouteSpec` is the raw record a route source yields. `Route` is the
//! validated, immutable form placed in a `RouteTable`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::routing::matcher::PathPrefixMatcher;
use crate::security::client_ip::normalize_ip;

/// Per-route rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitSpec {
    #[serde(alias = "maxRequests")]
    pub max_requests: u32,
    #[serde(alias = "windowMs")]
    pub window_ms: u64,
}

/// A route as delivered by a route source.
///
/// Field aliases accept the camelCase payloads of route-management services.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouteSpec {
    pub id: u64,

    #[serde(default, alias = "routeId")]
    pub route_id: Option<String>,

    #[serde(default)]
    pub predicate: Option<String>,

    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default, alias = "ipFilterEnabled")]
    pub ip_filter_enabled: bool,

    #[serde(default, alias = "tokenRequired")]
    pub token_required: bool,

    #[serde(default, alias = "rateLimitEnabled")]
    pub rate_limit_enabled: bool,

    #[serde(default, alias = "allowedIps")]
    pub allowed_ips: Vec<String>,

    #[serde(default, alias = "rateLimit")]
    pub rate_limit: Option<RateLimitSpec>,

    /// Inactive routes are dropped when the table is built.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RouteSpec {
    /// Minimal spec for a predicate and backend, all policies off.
    pub fn new(id: u64, predicate: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id,
            route_id: None,
            predicate: Some(predicate.into()),
            uri: Some(uri.into()),
            ip_filter_enabled: false,
            token_required: false,
            rate_limit_enabled: false,
            allowed_ips: Vec::new(),
            rate_limit: None,
            enabled: true,
        }
    }

    /// The effective route id: explicit `route_id`, else the numeric id.
    pub fn effective_route_id(&self) -> String {
        match self.route_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// Why a route spec was excluded from a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route {route_id}: missing predicate")]
    MissingPredicate { route_id: String },

    #[error("route {route_id}: missing uri")]
    MissingUri { route_id: String },

    #[error("route {route_id}: invalid uri '{uri}': {reason}")]
    InvalidUri {
        route_id: String,
        uri: String,
        reason: String,
    },

    #[error("route {route_id}: duplicate route id")]
    DuplicateRouteId { route_id: String },
}

/// Policy switches for a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteFlags {
    pub ip_filter_enabled: bool,
    pub token_required: bool,
    pub rate_limit_enabled: bool,
}

/// A validated route.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: u64,
    pub route_id: String,
    pub uri: Url,
    pub flags: RouteFlags,
    pub allowed_ips: HashSet<String>,
    pub rate_limit: Option<RateLimitSpec>,
    matcher: PathPrefixMatcher,
}

impl Route {
    /// Validate a spec into a route.
    pub fn from_spec(spec: RouteSpec) -> Result<Self, RouteError> {
        let route_id = spec.effective_route_id();

        let predicate = match spec.predicate {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(RouteError::MissingPredicate { route_id }),
        };

        let raw_uri = match spec.uri {
            Some(u) if !u.trim().is_empty() => u,
            _ => return Err(RouteError::MissingUri { route_id }),
        };
        let uri = Url::parse(raw_uri.trim()).map_err(|e| RouteError::InvalidUri {
            route_id: route_id.clone(),
            uri: raw_uri.clone(),
            reason: e.to_string(),
        })?;
        if uri.host_str().is_none() {
            return Err(RouteError::InvalidUri {
                route_id,
                uri: raw_uri,
                reason: "uri has no host".to_string(),
            });
        }
        // The upstream client speaks plain HTTP only.
        if uri.scheme() != "http" {
            return Err(RouteError::InvalidUri {
                reason: format!("unsupported scheme '{}', expected http", uri.scheme()),
                route_id,
                uri: raw_uri,
            });
        }

        let allowed_ips = spec
            .allowed_ips
            .iter()
            .map(|ip| ip.trim())
            .filter(|ip| !ip.is_empty())
            .map(normalize_ip)
            .collect();

        Ok(Self {
            id: spec.id,
            route_id,
            uri,
            flags: RouteFlags {
                ip_filter_enabled: spec.ip_filter_enabled,
                token_required: spec.token_required,
                rate_limit_enabled: spec.rate_limit_enabled,
            },
            allowed_ips,
            rate_limit: spec.rate_limit,
            matcher: PathPrefixMatcher::new(predicate),
        })
    }

    pub fn predicate(&self) -> &str {
        self.matcher.predicate()
    }

    /// Canonical prefix (predicate without its wildcard marker).
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }
}
