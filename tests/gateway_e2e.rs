//! End-to-end tests: client → gateway → mock backend.

use std::sync::Arc;

use api_gateway::routing::{RateLimitSpec, RouteSource, RouteSourceError, RouteSpec, StaticRouteSource};
use api_gateway::{Gateway, GatewayHandle};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{client, mint_token, route, start_mock_backend, start_status_backend, test_config};

async fn start_gateway(routes: Vec<RouteSpec>) -> GatewayHandle {
    Gateway::new(test_config())
        .with_route_source(Arc::new(StaticRouteSource::new(routes)))
        .start()
        .await
        .expect("gateway should start")
}

fn url(handle: &GatewayHandle, path: &str) -> String {
    format!("http://{}{}", handle.address(), path)
}

#[tokio::test]
async fn test_token_and_rate_limited_route() {
    let backend = start_mock_backend("orders").await;
    let mut spec = route(1, "orders", "/api/orders/**", &backend.uri());
    spec.token_required = true;
    spec.rate_limit_enabled = true;
    spec.rate_limit = Some(RateLimitSpec {
        max_requests: 2,
        window_ms: 60_000,
    });
    let gateway = start_gateway(vec![spec]).await;

    let token = mint_token("alice", 600);
    let client = client();
    let mut statuses = Vec::new();
    let mut last = None;
    for _ in 0..3 {
        let res = client
            .get(url(&gateway, "/api/orders/42"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        statuses.push(res.status());
        last = Some(res);
    }

    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );
    let rejected = last.unwrap();
    assert!(rejected.headers().contains_key("retry-after"));
    assert_eq!(rejected.headers()["x-ratelimit-remaining"], "0");
    let body: Value = rejected.json().await.unwrap();
    assert_eq!(body["reason"], "Rate Limit");

    assert_eq!(backend.hits(), 2);
    let summary = gateway.collector().summary();
    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.total_rejections, 1);
    let reasons = gateway.collector().rejection_reasons();
    assert_eq!(reasons.len(), 1);
    assert_eq!(reasons.get("Rate Limit"), Some(&1));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests_respect_limit() {
    let backend = start_mock_backend("ok").await;
    let mut spec = route(1, "burst", "/burst/**", &backend.uri());
    spec.rate_limit_enabled = true;
    spec.rate_limit = Some(RateLimitSpec {
        max_requests: 5,
        window_ms: 60_000,
    });
    let gateway = start_gateway(vec![spec]).await;
    let client = client();
    let target = url(&gateway, "/burst/x");

    let responses = join_all((0..20).map(|_| client.get(&target).send())).await;
    let ok = responses
        .iter()
        .filter(|r| r.as_ref().unwrap().status() == StatusCode::OK)
        .count();
    let limited = responses
        .iter()
        .filter(|r| r.as_ref().unwrap().status() == StatusCode::TOO_MANY_REQUESTS)
        .count();

    assert_eq!((ok, limited), (5, 15));
    assert_eq!(backend.hits(), 5);
    let snapshot = gateway.collector().route_snapshot("burst").unwrap();
    assert_eq!((snapshot.requests, snapshot.rejections), (20, 15));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_open_route_ignores_token() {
    let backend = start_mock_backend("public").await;
    let gateway = start_gateway(vec![route(1, "public", "/public/**", &backend.uri())]).await;
    let client = client();

    let without = client.get(url(&gateway, "/public/a?x=1")).send().await.unwrap();
    assert_eq!(without.status(), StatusCode::OK);
    assert_eq!(without.text().await.unwrap(), "public");

    let with = client
        .get(url(&gateway, "/public/b"))
        .bearer_auth("not-even-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(with.status(), StatusCode::OK);

    assert_eq!(backend.hits(), 2);
    assert_eq!(backend.paths(), vec!["/public/a?x=1", "/public/b"]);

    let snapshot = gateway.collector().route_snapshot("public").unwrap();
    assert_eq!(snapshot.requests, 2);
    assert_eq!(snapshot.rejections, 0);
    assert!(gateway.collector().rejection_reasons().is_empty());

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_missing_and_expired_tokens_are_401() {
    let backend = start_mock_backend("secure").await;
    let mut spec = route(1, "secure", "/secure/**", &backend.uri());
    spec.token_required = true;
    let gateway = start_gateway(vec![spec]).await;
    let client = client();

    let missing = client.get(url(&gateway, "/secure/x")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let expired = client
        .get(url(&gateway, "/secure/x"))
        .bearer_auth(mint_token("bob", -600))
        .send()
        .await
        .unwrap();
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    let body: Value = expired.json().await.unwrap();
    assert_eq!(body["reason"], "Token Validation");

    let valid = client
        .get(url(&gateway, "/secure/x"))
        .bearer_auth(mint_token("bob", 600))
        .send()
        .await
        .unwrap();
    assert_eq!(valid.status(), StatusCode::OK);

    assert_eq!(backend.hits(), 1);
    assert_eq!(
        gateway.collector().rejection_reasons().get("Token Validation"),
        Some(&2)
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_ip_allow_list() {
    let backend = start_mock_backend("internal").await;
    let mut spec = route(1, "internal", "/internal/**", &backend.uri());
    spec.ip_filter_enabled = true;
    spec.allowed_ips = vec!["10.1.1.1".into()];
    let gateway = start_gateway(vec![spec]).await;
    let client = client();

    let allowed = client
        .get(url(&gateway, "/internal/x"))
        .header("X-Forwarded-For", "10.1.1.1, 172.16.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    let denied = client
        .get(url(&gateway, "/internal/x"))
        .header("X-Forwarded-For", "10.9.9.9")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    // No proxy header: the loopback peer address is not on the list.
    let direct = client.get(url(&gateway, "/internal/x")).send().await.unwrap();
    assert_eq!(direct.status(), StatusCode::FORBIDDEN);

    assert_eq!(gateway.collector().rejection_reasons().get("IP Filter"), Some(&2));
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_longest_prefix_wins() {
    let general = start_mock_backend("general").await;
    let v2 = start_mock_backend("v2").await;
    // The less specific route comes first in fetch order.
    let gateway = start_gateway(vec![
        route(1, "api", "/api/**", &general.uri()),
        route(2, "api-v2", "/api/v2/**", &v2.uri()),
    ])
    .await;
    let client = client();

    let res = client.get(url(&gateway, "/api/v2/users")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "v2");
    let res = client.get(url(&gateway, "/api/v1/users")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "general");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_path_is_404() {
    let backend = start_mock_backend("x").await;
    let gateway = start_gateway(vec![route(1, "api", "/api/**", &backend.uri())]).await;

    let res = client().get(url(&gateway, "/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "No matching route found");
    assert_eq!(body["reason"], "Invalid Request");

    let unmatched = gateway.collector().route_snapshot("_unmatched").unwrap();
    assert_eq!((unmatched.requests, unmatched.rejections), (1, 1));
    assert_eq!(backend.hits(), 0);

    gateway.shutdown().await;
}

struct FailingSource;

#[async_trait]
impl RouteSource for FailingSource {
    fn describe(&self) -> String {
        "failing".into()
    }

    async fn fetch(&self) -> Result<Vec<RouteSpec>, RouteSourceError> {
        Err(RouteSourceError::Status(500))
    }
}

#[tokio::test]
async fn test_never_populated_table_is_503() {
    let gateway = Gateway::new(test_config())
        .with_route_source(Arc::new(FailingSource))
        .start()
        .await
        .unwrap();

    let res = client().get(url(&gateway, "/api/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(!gateway.refresher().has_populated());

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_backend_errors() {
    let failing = start_status_backend(500, "boom").await;
    let gateway = start_gateway(vec![
        route(1, "broken", "/broken/**", &failing.uri()),
        route(2, "down", "/down/**", "http://127.0.0.1:1"),
    ])
    .await;
    let client = client();

    let res = client.get(url(&gateway, "/broken/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text().await.unwrap(), "boom");

    let res = client.get(url(&gateway, "/down/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Upstream request failed");

    assert_eq!(gateway.collector().rejection_reasons().get("Other"), Some(&2));
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let backend = start_mock_backend("ok").await;
    let gateway = start_gateway(vec![route(1, "all", "/**", &backend.uri())]).await;
    let client = client();

    let res = client.get(url(&gateway, "/anything")).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());

    let res = client
        .get(url(&gateway, "/anything"))
        .header("x-request-id", "client-chosen")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "client-chosen");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_forwarding() {
    let backend = start_mock_backend("ok").await;
    let mut config = test_config();
    config.listener.max_body_bytes = 1024;
    let gateway = Gateway::new(config)
        .with_route_source(Arc::new(StaticRouteSource::new(vec![route(
            1,
            "upload",
            "/upload/**",
            &backend.uri(),
        )])))
        .start()
        .await
        .unwrap();
    let client = client();

    let oversized = client
        .post(url(&gateway, "/upload/file"))
        .body(vec![b'x'; 4096])
        .send()
        .await;
    // The server may close the connection without reading the rest of the body.
    if let Ok(res) = oversized {
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
    assert_eq!(backend.hits(), 0);

    let res = client
        .post(url(&gateway, "/upload/file"))
        .body(vec![b'x'; 512])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 1);

    gateway.shutdown().await;
}
