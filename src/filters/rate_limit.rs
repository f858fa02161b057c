//! Rate limiting filter.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::error::GatewayError;
use crate::filters::{Decision, Filter, RequestContext, Rejection};
use crate::routing::RateLimitSpec;
use crate::security::{RateLimitKey, RateLimiter};

/// Applies the route's fixed window limit per client IP.
///
/// Routes that enable rate limiting without a limit of their own fall back
/// to `default_limit`.
pub struct RateLimiterFilter {
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    default_limit: RateLimitSpec,
}

impl RateLimiterFilter {
    pub fn new(limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>, default_limit: RateLimitSpec) -> Self {
        Self {
            limiter,
            clock,
            default_limit,
        }
    }
}

#[async_trait]
impl Filter for RateLimiterFilter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn apply(&self, ctx: &mut RequestContext<'_>) -> Decision {
        if !ctx.route.flags.rate_limit_enabled {
            return ControlFlow::Continue(());
        }

        let limit = match ctx.route.rate_limit {
            Some(limit) => limit,
            None => {
                tracing::debug!(
                    route_id = %ctx.route.route_id,
                    max_requests = self.default_limit.max_requests,
                    window_ms = self.default_limit.window_ms,
                    "Route has no rate limit, applying default"
                );
                self.default_limit
            }
        };

        let key = RateLimitKey::new(ctx.client_ip.clone(), ctx.route.route_id.clone());
        let decision = self.limiter.allow(
            &key,
            limit.max_requests,
            limit.window_ms,
            self.clock.now_millis(),
        );
        ctx.rate = Some(decision);

        if decision.allowed {
            return ControlFlow::Continue(());
        }

        tracing::warn!(
            key = %key,
            limit = limit.max_requests,
            window_ms = limit.window_ms,
            "Rate limit exceeded"
        );
        ControlFlow::Break(Rejection::from(GatewayError::RateExceeded {
            retry_after_ms: decision.reset_after_ms,
        }))
    }
}
