//! Proxy handler: match, filter, forward.
//!
//! # Responsibilities
//! - Resolve the request path against the live route table
//! - Run the filter chain for the matched route
//! - Forward accepted requests to the route's backend
//! - Complete the request's metrics record with the final status
//!
//! # Design Decisions
//! - The route table is loaded once per request; a concurrent reload never
//!   changes the route a request is already using
//! - Scheme and authority come from the route URI; path and query are kept
//! - Backend errors map to 502, backend timeouts to 504

use std::net::SocketAddr;
use std::ops::ControlFlow;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, request::Parts, HeaderValue, Request, Uri, Version},
    response::{IntoResponse, Response},
};
use url::Url;

use crate::error::GatewayError;
use crate::filters::{RequestContext, RequestRecord};
use crate::http::request::{request_id, X_REQUEST_ID};
use crate::http::response::apply_rate_headers;
use crate::http::server::AppState;
use crate::observability::UNMATCHED_ROUTE;
use crate::routing::Route;

/// Main gateway handler.
pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request_id(request.headers()).to_string();
    let path = request.uri().path().to_string();

    let table = state.routes.load_full();
    let Some(route) = table.match_path(&path).cloned() else {
        let err = if state.refresher.has_populated() {
            GatewayError::RouteNotFound { path: path.clone() }
        } else {
            GatewayError::TableUnavailable
        };
        tracing::warn!(request_id = %request_id, path = %path, error = %err, "Unroutable request");
        RequestRecord::start(state.collector.clone(), UNMATCHED_ROUTE)
            .finish(err.status(), Some(err.reason()));
        return err.into_response();
    };

    let client_ip = state.client_ip.resolve(request.headers(), Some(peer));
    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %path,
        route_id = %route.route_id,
        client_ip = %client_ip,
        "Route matched"
    );

    let (parts, body) = request.into_parts();
    let mut ctx = RequestContext::new(route.clone(), &parts.headers, client_ip);
    let decision = state.chain.evaluate(&mut ctx).await;
    let record = ctx.record.take();
    let rate = ctx.rate;
    drop(ctx);

    let mut response = match decision {
        ControlFlow::Break(rejection) => {
            if let Some(record) = record {
                record.finish(rejection.status, Some(rejection.reason));
            }
            rejection.into_response()
        }
        ControlFlow::Continue(()) => {
            let response = match forward(&state, &route, parts, body, &request_id).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        route_id = %route.route_id,
                        error = %e,
                        "Upstream request failed"
                    );
                    e.into_response()
                }
            };
            if let Some(record) = record {
                record.finish(response.status(), None);
            }
            response
        }
    };

    if let Some(rate) = rate {
        apply_rate_headers(response.headers_mut(), &rate);
    }
    response
}

async fn forward(
    state: &AppState,
    route: &Route,
    mut parts: Parts,
    body: Body,
    request_id: &str,
) -> Result<Response, GatewayError> {
    parts.uri = upstream_uri(&route.uri, &parts.uri)?;
    parts.version = Version::HTTP_11;
    parts.headers.remove(header::HOST);
    if let Ok(value) = HeaderValue::from_str(request_id) {
        parts.headers.insert(X_REQUEST_ID, value);
    }

    let upstream = Request::from_parts(parts, body);
    match tokio::time::timeout(state.upstream_timeout, state.client.request(upstream)).await {
        Ok(Ok(response)) => {
            let (parts, body) = response.into_parts();
            Ok(Response::from_parts(parts, Body::new(body)))
        }
        Ok(Err(e)) => Err(GatewayError::UpstreamUnavailable(e.to_string())),
        Err(_) => Err(GatewayError::UpstreamTimeout),
    }
}

/// Replace scheme and authority of `original` with those of the route URI.
pub fn upstream_uri(target: &Url, original: &Uri) -> Result<Uri, GatewayError> {
    let host = target
        .host_str()
        .ok_or_else(|| GatewayError::UpstreamUnavailable("route uri has no host".into()))?;
    let authority = match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    format!("{}://{}{}", target.scheme(), authority, path_and_query)
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| GatewayError::UpstreamUnavailable(e.to_string()))
}
