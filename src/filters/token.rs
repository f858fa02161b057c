//! Bearer token check.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;

use crate::error::GatewayError;
use crate::filters::{Decision, Filter, RequestContext, Rejection};
use crate::security::token::{parse_bearer, AuthError, TokenVerifier};

/// Requires a valid bearer token on routes with `token_required`.
///
/// Verification is bounded by `timeout`; a slow or unreachable verifier
/// rejects the request with 401.
pub struct TokenFilter {
    verifier: Arc<dyn TokenVerifier>,
    timeout: Duration,
}

impl TokenFilter {
    pub fn new(verifier: Arc<dyn TokenVerifier>, timeout: Duration) -> Self {
        Self { verifier, timeout }
    }

    fn reject(ctx: &RequestContext<'_>, err: AuthError) -> Decision {
        tracing::warn!(
            route_id = %ctx.route.route_id,
            client_ip = %ctx.client_ip,
            error = %err,
            "Token validation failed"
        );
        ControlFlow::Break(Rejection::from(GatewayError::Authentication(err)))
    }
}

#[async_trait]
impl Filter for TokenFilter {
    fn name(&self) -> &'static str {
        "token"
    }

    async fn apply(&self, ctx: &mut RequestContext<'_>) -> Decision {
        if !ctx.route.flags.token_required {
            return ControlFlow::Continue(());
        }

        let headers = ctx.headers;
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = match parse_bearer(header) {
            Ok(token) => token,
            Err(e) => return Self::reject(ctx, e),
        };

        match tokio::time::timeout(self.timeout, self.verifier.verify(token)).await {
            Ok(Ok(verified)) => {
                ctx.token = Some(verified);
                ControlFlow::Continue(())
            }
            Ok(Err(e)) => Self::reject(ctx, e),
            Err(_) => Self::reject(ctx, AuthError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
