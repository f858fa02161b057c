use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::security::token::parse_bearer;

/// Requires `Authorization: Bearer <admin api key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let authorized = match parse_bearer(auth_header) {
        Ok(key) => !state.admin_api_key.is_empty() && key == &*state.admin_api_key,
        Err(e) => {
            tracing::debug!(error = %e, "Admin request without usable bearer key");
            false
        }
    };
    if authorized {
        return Ok(next.run(request).await);
    }

    tracing::warn!("Rejected admin request with missing or invalid API key");
    Err(StatusCode::UNAUTHORIZED)
}
