//! Route reload tests with a file-backed route source.

use std::path::Path;
use std::time::Duration;

use api_gateway::config::{GatewayConfig, RouteSourceKind};
use api_gateway::{Gateway, GatewayHandle};
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{client, start_mock_backend, test_config, ADMIN_KEY};

fn routes_toml(entries: &[(&str, &str, &str)]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, (route_id, predicate, uri))| {
            format!(
                "[[routes]]\nid = {}\nroute_id = \"{}\"\npredicate = \"{}\"\nuri = \"{}\"\n\n",
                i + 1,
                route_id,
                predicate,
                uri
            )
        })
        .collect()
}

fn file_config(path: &Path, watch: bool) -> GatewayConfig {
    let mut config = test_config();
    config.route_source.kind = RouteSourceKind::File;
    config.route_source.path = Some(path.to_string_lossy().into_owned());
    config.refresh.watch_file = watch;
    config
}

async fn refresh(handle: &GatewayHandle) -> reqwest::Response {
    client()
        .post(format!(
            "http://{}/admin/routes/refresh",
            handle.admin_address().unwrap()
        ))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_file_source_reload_on_refresh() {
    let backend = start_mock_backend("ok").await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.toml");
    std::fs::write(&path, routes_toml(&[("api", "/api/**", &backend.uri())])).unwrap();

    let gateway = Gateway::new(file_config(&path, false)).start().await.unwrap();
    let base = format!("http://{}", gateway.address());
    let client = client();

    let res = client.get(format!("{base}/users/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    std::fs::write(
        &path,
        routes_toml(&[
            ("api", "/api/**", &backend.uri()),
            ("users", "/users/**", &backend.uri()),
        ]),
    )
    .unwrap();
    let res = refresh(&gateway).await;
    assert_eq!(res.status(), StatusCode::OK);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status["route_count"], 2);
    assert_eq!(status["generation"], 2);

    let res = client.get(format!("{base}/users/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_failed_reload_keeps_serving_last_table() {
    let backend = start_mock_backend("still here").await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.toml");
    std::fs::write(&path, routes_toml(&[("api", "/api/**", &backend.uri())])).unwrap();

    let gateway = Gateway::new(file_config(&path, false)).start().await.unwrap();
    let base = format!("http://{}", gateway.address());

    std::fs::write(&path, "[[routes]]\nid = \"not a number\"\n").unwrap();
    let res = refresh(&gateway).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Route refresh failed");
    assert_eq!(body["status"]["failures"], 1);
    assert_eq!(body["status"]["route_count"], 1);

    let res = client().get(format!("{base}/api/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "still here");

    // A missing file is a failed fetch too.
    std::fs::remove_file(&path).unwrap();
    let res = refresh(&gateway).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(gateway.refresher().has_populated());

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_file_change_triggers_reload() {
    let backend = start_mock_backend("ok").await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.toml");
    std::fs::write(&path, routes_toml(&[("api", "/api/**", &backend.uri())])).unwrap();

    let gateway = Gateway::new(file_config(&path, true)).start().await.unwrap();
    assert_eq!(gateway.refresher().status().route_count, 1);

    std::fs::write(
        &path,
        routes_toml(&[
            ("api", "/api/**", &backend.uri()),
            ("docs", "/docs/**", &backend.uri()),
        ]),
    )
    .unwrap();

    let mut reloaded = false;
    for _ in 0..50 {
        if gateway.refresher().status().route_count == 2 {
            reloaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(reloaded, "route file change was not picked up");

    gateway.shutdown().await;
}
