//! Route sources.
//!
//! A route source yields the complete set of route specs on every call.
//! The gateway never diffs: each fetch replaces the whole table.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{GatewayConfig, RouteSourceKind};
use crate::routing::route::RouteSpec;

/// Errors raised while fetching routes.
#[derive(Debug, Error)]
pub enum RouteSourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse routes: {0}")]
    Parse(String),

    #[error("route request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("route endpoint returned status {0}")]
    Status(u16),

    #[error("route source misconfigured: {0}")]
    Misconfigured(String),
}

/// Supplies the full active route set.
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Fetch every route spec.
    async fn fetch(&self) -> Result<Vec<RouteSpec>, RouteSourceError>;
}

/// Build the route source selected by the configuration.
pub fn from_config(config: &GatewayConfig) -> Result<Box<dyn RouteSource>, RouteSourceError> {
    let source_config = &config.route_source;
    match source_config.kind {
        RouteSourceKind::Inline => Ok(Box::new(StaticRouteSource::new(config.routes.clone()))),
        RouteSourceKind::File => {
            let path = source_config.path.as_deref().ok_or_else(|| {
                RouteSourceError::Misconfigured("file source requires a path".into())
            })?;
            Ok(Box::new(FileRouteSource::new(path)))
        }
        RouteSourceKind::Http => {
            let url = source_config.url.as_deref().ok_or_else(|| {
                RouteSourceError::Misconfigured("http source requires a url".into())
            })?;
            let source =
                HttpRouteSource::new(url, Duration::from_millis(source_config.timeout_ms))?;
            Ok(Box::new(source))
        }
    }
}

/// Routes held in memory. Contents can be replaced, which makes it the
/// source for inline config and for tests.
#[derive(Debug, Default)]
pub struct StaticRouteSource {
    routes: RwLock<Vec<RouteSpec>>,
}

impl StaticRouteSource {
    pub fn new(routes: Vec<RouteSpec>) -> Self {
        Self {
            routes: RwLock::new(routes),
        }
    }

    /// Replace the routes returned by subsequent fetches.
    pub fn replace(&self, routes: Vec<RouteSpec>) {
        *self.routes.write().unwrap_or_else(PoisonError::into_inner) = routes;
    }
}

#[async_trait]
impl RouteSource for StaticRouteSource {
    fn describe(&self) -> String {
        "inline".to_string()
    }

    async fn fetch(&self) -> Result<Vec<RouteSpec>, RouteSourceError> {
        Ok(self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// On-disk route file layout for TOML.
#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default)]
    routes: Vec<RouteSpec>,
}

/// JSON payloads may be a bare array or wrapped in `{"routes": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoutePayload {
    List(Vec<RouteSpec>),
    Wrapped { routes: Vec<RouteSpec> },
}

impl From<RoutePayload> for Vec<RouteSpec> {
    fn from(payload: RoutePayload) -> Self {
        match payload {
            RoutePayload::List(routes) | RoutePayload::Wrapped { routes } => routes,
        }
    }
}

/// Routes read from a TOML (`[[routes]]`) or JSON file.
#[derive(Debug, Clone)]
pub struct FileRouteSource {
    path: PathBuf,
}

impl FileRouteSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

#[async_trait]
impl RouteSource for FileRouteSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<RouteSpec>, RouteSourceError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| RouteSourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;

        if self.is_json() {
            let payload: RoutePayload = serde_json::from_str(&content)
                .map_err(|e| RouteSourceError::Parse(e.to_string()))?;
            Ok(payload.into())
        } else {
            let file: RouteFile =
                toml::from_str(&content).map_err(|e| RouteSourceError::Parse(e.to_string()))?;
            Ok(file.routes)
        }
    }
}

/// Routes fetched as JSON from a route-management endpoint.
#[derive(Debug, Clone)]
pub struct HttpRouteSource {
    url: String,
    client: reqwest::Client,
}

impl HttpRouteSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RouteSourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl RouteSource for HttpRouteSource {
    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }

    async fn fetch(&self) -> Result<Vec<RouteSpec>, RouteSourceError> {
        tracing::debug!(url = %self.url, "Fetching routes");

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RouteSourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let payload: RoutePayload =
            serde_json::from_slice(&body).map_err(|e| RouteSourceError::Parse(e.to_string()))?;
        Ok(payload.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_source_replace() {
        let source = StaticRouteSource::new(vec![RouteSpec::new(1, "/a", "http://a")]);
        assert_eq!(source.fetch().await.unwrap().len(), 1);

        source.replace(Vec::new());
        assert!(source.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_source_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [[routes]]
            id = 1
            predicate = "/api/**"
            uri = "http://127.0.0.1:3000"

            [[routes]]
            id = 2
            predicate = "/admin"
            uri = "http://127.0.0.1:3001"
            ip_filter_enabled = true
            allowed_ips = ["10.0.0.1"]
            "#
        )
        .unwrap();

        let source = FileRouteSource::new(file.path());
        let routes = source.fetch().await.unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes[1].ip_filter_enabled);
    }

    #[tokio::test]
    async fn test_file_source_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"routes": [{{"id": 9, "predicate": "/x", "uri": "http://x"}}]}}"#
        )
        .unwrap();

        let routes = FileRouteSource::new(file.path()).fetch().await.unwrap();
        assert_eq!(routes[0].id, 9);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileRouteSource::new("/no/such/routes.toml");
        assert!(matches!(
            source.fetch().await,
            Err(RouteSourceError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_http_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "routeId": "users", "predicate": "/users/**", "uri": "http://users:80"}
            ])))
            .mount(&server)
            .await;

        let source =
            HttpRouteSource::new(format!("{}/routes", server.uri()), Duration::from_secs(2))
                .unwrap();
        let routes = source.fetch().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].effective_route_id(), "users");
    }

    #[tokio::test]
    async fn test_http_source_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpRouteSource::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(RouteSourceError::Status(500))
        ));
    }
}
