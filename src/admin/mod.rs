//! Admin API: metrics snapshots, the live route table and on-demand refresh.
//!
//! Every endpoint requires the admin API key as a bearer token.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/metrics/summary", get(get_metrics_summary))
        .route("/admin/metrics/routes", get(get_route_metrics))
        .route("/admin/metrics/rejections", get(get_rejection_reasons))
        .route("/admin/metrics/timeseries", get(get_time_series))
        .route("/admin/routes", get(get_routes))
        .route("/admin/routes/refresh", post(refresh_routes))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
