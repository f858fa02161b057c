//! Admin API tests against a running gateway.

use std::sync::Arc;

use api_gateway::routing::{RouteSpec, StaticRouteSource};
use api_gateway::{Gateway, GatewayHandle};
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{client, route, start_mock_backend, test_config, ADMIN_KEY};

async fn start_gateway(source: Arc<StaticRouteSource>) -> GatewayHandle {
    Gateway::new(test_config())
        .with_route_source(source)
        .start()
        .await
        .expect("gateway should start")
}

fn admin_url(handle: &GatewayHandle, path: &str) -> String {
    format!("http://{}{}", handle.admin_address().unwrap(), path)
}

async fn admin_get(handle: &GatewayHandle, path: &str) -> (StatusCode, Value) {
    let res = client()
        .get(admin_url(handle, path))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_admin_requires_api_key() {
    let gateway = start_gateway(Arc::new(StaticRouteSource::default())).await;
    let client = client();

    let res = client.get(admin_url(&gateway, "/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(admin_url(&gateway, "/admin/status"))
        .bearer_auth("wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = admin_get(&gateway, "/admin/status").await;
    assert_eq!(status, StatusCode::OK);

    // The scheme is case-insensitive, as for route tokens.
    for scheme in ["bearer", "BEARER"] {
        let res = client
            .get(admin_url(&gateway, "/admin/status"))
            .header("Authorization", format!("{scheme} {ADMIN_KEY}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "scheme {scheme}");
    }

    let res = client
        .get(admin_url(&gateway, "/admin/status"))
        .header("Authorization", format!("Basic {ADMIN_KEY}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_status_and_routes() {
    let backend = start_mock_backend("ok").await;
    let mut secured = route(2, "secured", "/secure/**", &backend.uri());
    secured.token_required = true;
    let source = Arc::new(StaticRouteSource::new(vec![
        route(1, "api", "/api/**", &backend.uri()),
        secured,
        RouteSpec {
            predicate: None,
            ..route(3, "broken", "/x/**", &backend.uri())
        },
    ]));
    let gateway = start_gateway(source).await;

    let (status, body) = admin_get(&gateway, "/admin/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["refresh"]["populated"], true);
    assert_eq!(body["refresh"]["route_count"], 2);
    assert_eq!(body["filters"][0], "counter");

    let (status, body) = admin_get(&gateway, "/admin/routes").await;
    assert_eq!(status, StatusCode::OK);
    let routes = body["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 2);
    let secured = routes.iter().find(|r| r["route_id"] == "secured").unwrap();
    assert_eq!(secured["prefix"], "/secure");
    assert_eq!(secured["flags"]["token_required"], true);
    assert_eq!(body["skipped"].as_array().unwrap().len(), 1);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_metrics_endpoints() {
    let backend = start_mock_backend("ok").await;
    let source = Arc::new(StaticRouteSource::new(vec![route(
        1,
        "api",
        "/api/**",
        &backend.uri(),
    )]));
    let gateway = start_gateway(source).await;
    let client = client();
    let base = format!("http://{}", gateway.address());

    client.get(format!("{base}/api/one")).send().await.unwrap();
    client.get(format!("{base}/api/two")).send().await.unwrap();
    client.get(format!("{base}/missing")).send().await.unwrap();

    let (status, summary) = admin_get(&gateway, "/admin/metrics/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_requests"], 3);
    assert_eq!(summary["total_rejections"], 1);
    let recent = summary["current_minute"]["requests"].as_u64().unwrap()
        + summary["previous_minute"]["requests"].as_u64().unwrap();
    assert_eq!(recent, 3);

    let (_, routes) = admin_get(&gateway, "/admin/metrics/routes").await;
    let api = routes
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["route_id"] == "api")
        .unwrap();
    assert_eq!(api["requests"], 2);
    assert_eq!(api["samples"], 2);

    let (_, reasons) = admin_get(&gateway, "/admin/metrics/rejections").await;
    assert_eq!(reasons["Invalid Request"], 1);
    assert!(reasons.get("Rate Limit").is_none());

    let (status, series) = admin_get(&gateway, "/admin/metrics/timeseries?range=hour&route=api").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(series["range"], "hour");
    assert_eq!(series["route"], "api");
    let points = series["points"].as_array().unwrap();
    assert_eq!(points.len(), 60);
    let total: u64 = points.iter().map(|p| p["requests"].as_u64().unwrap()).sum();
    assert_eq!(total, 2);

    let (status, body) = admin_get(&gateway, "/admin/metrics/timeseries?range=year").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_refresh_picks_up_new_routes() {
    let first = start_mock_backend("first").await;
    let second = start_mock_backend("second").await;
    let source = Arc::new(StaticRouteSource::new(vec![route(
        1,
        "api",
        "/api/**",
        &first.uri(),
    )]));
    let gateway = start_gateway(source.clone()).await;
    let client = client();
    let base = format!("http://{}", gateway.address());

    let res = client.get(format!("{base}/api/x")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "first");
    let res = client.get(format!("{base}/new/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    source.replace(vec![
        route(1, "api", "/api/**", &second.uri()),
        route(2, "new", "/new/**", &second.uri()),
    ]);
    let res = client
        .post(admin_url(&gateway, "/admin/routes/refresh"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status["route_count"], 2);

    let res = client.get(format!("{base}/api/x")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "second");
    let res = client.get(format!("{base}/new/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.shutdown().await;
}
