//! Per-route policy checks.
//!
//! # Data Flow
//! ```text
//! Matched route + request headers + client IP
//!     → counter.rs (record the request, attach completion guard)
//!     → ip_filter.rs (allow list, 403)
//!     → token.rs (bearer token, 401)
//!     → rate_limit.rs (fixed window, 429)
//!     → Continue: forward to backend | Break(Rejection): respond
//! ```
//!
//! # Design Decisions
//! - Filters run in a fixed order and the first `Break` wins
//! - Filters never fail: every failure path is a `Rejection` with a status
//!   and a reason tag
//! - A disabled policy is a pass-through, not an absent filter, so the
//!   order is the same for every route

pub mod counter;
pub mod ip_filter;
pub mod rate_limit;
pub mod token;

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, RejectReason};
use crate::observability::MetricsCollector;
use crate::routing::{RateLimitSpec, Route};
use crate::security::{RateDecision, RateLimiter, TokenVerifier, VerifiedToken};

pub use counter::{CounterFilter, RequestRecord};
pub use ip_filter::IpFilter;
pub use rate_limit::RateLimiterFilter;
pub use token::TokenFilter;

/// Why a request was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub reason: RejectReason,
    /// Fixed client-facing message.
    pub message: &'static str,
}

impl From<&GatewayError> for Rejection {
    fn from(err: &GatewayError) -> Self {
        Self {
            status: err.status(),
            reason: err.reason(),
            message: err.public_message(),
        }
    }
}

impl From<GatewayError> for Rejection {
    fn from(err: GatewayError) -> Self {
        Self::from(&err)
    }
}

/// Outcome of one filter.
pub type Decision = ControlFlow<Rejection>;

/// State shared by the filters of one request.
pub struct RequestContext<'a> {
    pub route: Arc<Route>,
    pub headers: &'a HeaderMap,
    pub client_ip: String,
    /// Completion guard attached by the counter filter.
    pub record: Option<RequestRecord>,
    /// Last rate limit decision, used for response headers.
    pub rate: Option<RateDecision>,
    pub token: Option<VerifiedToken>,
}

impl<'a> RequestContext<'a> {
    pub fn new(route: Arc<Route>, headers: &'a HeaderMap, client_ip: impl Into<String>) -> Self {
        Self {
            route,
            headers,
            client_ip: client_ip.into(),
            record: None,
            rate: None,
            token: None,
        }
    }
}

/// A single policy check.
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, ctx: &mut RequestContext<'_>) -> Decision;
}

/// Ordered list of filters.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// The gateway's chain: counter, IP filter, token filter, rate limiter.
    pub fn from_config(
        config: &GatewayConfig,
        collector: Arc<MetricsCollector>,
        verifier: Arc<dyn TokenVerifier>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let clock = collector.clock().clone();
        let default_limit = RateLimitSpec {
            max_requests: config.rate_limit.default_max_requests,
            window_ms: config.rate_limit.default_window_ms,
        };

        Self::new(vec![
            Box::new(CounterFilter::new(collector)),
            Box::new(IpFilter),
            Box::new(TokenFilter::new(
                verifier,
                Duration::from_millis(config.auth.verify_timeout_ms),
            )),
            Box::new(RateLimiterFilter::new(limiter, clock, default_limit)),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter in order, stopping at the first rejection.
    pub async fn evaluate(&self, ctx: &mut RequestContext<'_>) -> Decision {
        for filter in &self.filters {
            if let ControlFlow::Break(rejection) = filter.apply(ctx).await {
                tracing::debug!(
                    filter = filter.name(),
                    route_id = %ctx.route.route_id,
                    client_ip = %ctx.client_ip,
                    status = rejection.status.as_u16(),
                    reason = %rejection.reason,
                    "Request rejected"
                );
                return ControlFlow::Break(rejection);
            }
        }
        ControlFlow::Continue(())
    }
}
