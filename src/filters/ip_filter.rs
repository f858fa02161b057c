//! Client IP allow list.

use std::ops::ControlFlow;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::filters::{Decision, Filter, RequestContext, Rejection};

/// Rejects clients missing from the route's allow list with 403.
///
/// Active only for routes with `ip_filter_enabled`. An enabled filter with an
/// empty list admits nobody.
pub struct IpFilter;

#[async_trait]
impl Filter for IpFilter {
    fn name(&self) -> &'static str {
        "ip_filter"
    }

    async fn apply(&self, ctx: &mut RequestContext<'_>) -> Decision {
        if !ctx.route.flags.ip_filter_enabled {
            return ControlFlow::Continue(());
        }

        if ctx.route.allowed_ips.contains(&ctx.client_ip) {
            return ControlFlow::Continue(());
        }

        tracing::warn!(
            route_id = %ctx.route.route_id,
            client_ip = %ctx.client_ip,
            "Client IP not in allow list"
        );
        ControlFlow::Break(Rejection::from(GatewayError::Authorization {
            client_ip: ctx.client_ip.clone(),
        }))
    }
}
