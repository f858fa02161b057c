use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::server::AppState;
use crate::observability::{MetricsSummary, RouteSnapshot, TimeRange, TimeSeries};
use crate::routing::{RateLimitSpec, RefreshStatus, Route, RouteFlags};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub filters: Vec<&'static str>,
    pub refresh: RefreshStatus,
}

#[derive(Serialize)]
pub struct RouteView {
    pub id: u64,
    pub route_id: String,
    pub predicate: String,
    pub prefix: String,
    pub uri: String,
    pub flags: RouteFlags,
    pub allowed_ips: Vec<String>,
    pub rate_limit: Option<RateLimitSpec>,
}

impl From<&Route> for RouteView {
    fn from(route: &Route) -> Self {
        let mut allowed_ips: Vec<String> = route.allowed_ips.iter().cloned().collect();
        allowed_ips.sort();
        Self {
            id: route.id,
            route_id: route.route_id.clone(),
            predicate: route.predicate().to_string(),
            prefix: route.prefix().to_string(),
            uri: route.uri.to_string(),
            flags: route.flags,
            allowed_ips,
            rate_limit: route.rate_limit,
        }
    }
}

#[derive(Serialize)]
pub struct RouteTableView {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub routes: Vec<RouteView>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimeSeriesQuery {
    pub range: Option<String>,
    pub route: Option<String>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let refresh = state.refresher.status();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if refresh.populated { "operational" } else { "awaiting_routes" },
        filters: state.chain.names(),
        refresh,
    })
}

pub async fn get_metrics_summary(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.collector.summary())
}

pub async fn get_route_metrics(State(state): State<AppState>) -> Json<Vec<RouteSnapshot>> {
    Json(state.collector.route_snapshots())
}

pub async fn get_rejection_reasons(State(state): State<AppState>) -> Json<BTreeMap<String, u64>> {
    Json(state.collector.rejection_reasons())
}

pub async fn get_time_series(
    State(state): State<AppState>,
    Query(query): Query<TimeSeriesQuery>,
) -> Result<Json<TimeSeries>, ApiError> {
    let range = match query.range.as_deref() {
        Some(raw) => raw.parse::<TimeRange>().map_err(|e| {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
        })?,
        None => TimeRange::default(),
    };
    let route = query.route.as_deref().filter(|r| !r.is_empty());
    Ok(Json(state.collector.time_series(range, route)))
}

pub async fn get_routes(State(state): State<AppState>) -> Json<RouteTableView> {
    let table = state.routes.load();
    Json(RouteTableView {
        generation: table.generation(),
        built_at: table.built_at(),
        routes: table.routes().iter().map(|r| RouteView::from(r.as_ref())).collect(),
        skipped: table.skipped().iter().map(|e| e.to_string()).collect(),
    })
}

/// Reload the route table now and report the outcome.
pub async fn refresh_routes(
    State(state): State<AppState>,
) -> Result<Json<RefreshStatus>, ApiError> {
    match state.refresher.reload().await {
        Ok(_) => Ok(Json(state.refresher.status())),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Route refresh failed",
                "detail": e.to_string(),
                "status": state.refresher.status(),
            })),
        )),
    }
}
