//! Client-facing responses for rejected requests.
//!
//! # Design Decisions
//! - Rejection bodies are short fixed JSON objects; no internal error text
//! - Rate limit state is reported through `X-RateLimit-*` headers, plus
//!   `Retry-After` once the limit is hit

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::GatewayError;
use crate::filters::Rejection;
use crate::security::RateDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "reason": self.reason,
        });
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        Rejection::from(&self).into_response()
    }
}

/// Add rate limit headers. Reset values are whole seconds, rounded up.
pub fn apply_rate_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let reset_secs = decision.reset_after_ms.div_ceil(1000);
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs));
    if !decision.allowed {
        headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}
