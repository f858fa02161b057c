//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Load the first route table, then start background tasks
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A failed first route load is not fatal; requests get 503 until a
//!   refresh succeeds
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig, RouteSourceKind};
use crate::filters::FilterChain;
use crate::http::server::{upstream_client, AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::observability::MetricsCollector;
use crate::routing::{source, Refresher, RouteFileWatcher, RouteSource, RouteSourceError};
use crate::security::token::{self, AuthError, TokenVerifier};
use crate::security::{ClientIpResolver, RateLimiter};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("token verifier: {0}")]
    Auth(#[from] AuthError),

    #[error("route source: {0}")]
    RouteSource(#[from] RouteSourceError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Assembles a gateway from configuration.
///
/// Collaborators normally built from config (route source, token verifier,
/// clock) can be overridden before `start`.
pub struct Gateway {
    config: GatewayConfig,
    source: Option<Arc<dyn RouteSource>>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            source: None,
            verifier: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_route_source(mut self, source: Arc<dyn RouteSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start every subsystem and return once the listeners are bound.
    pub async fn start(self) -> Result<GatewayHandle, StartupError> {
        let Gateway {
            config,
            source,
            verifier,
            clock,
        } = self;

        validate_config(&config).map_err(ConfigError::Validation)?;

        let collector = Arc::new(MetricsCollector::new(clock.clone(), config.metrics.clone()));
        let limiter = Arc::new(RateLimiter::new());
        let verifier: Arc<dyn TokenVerifier> = match verifier {
            Some(verifier) => verifier,
            None => Arc::from(token::from_config(&config.auth)?),
        };
        let source: Arc<dyn RouteSource> = match source {
            Some(source) => source,
            None => Arc::from(source::from_config(&config)?),
        };

        let refresher = Arc::new(Refresher::new(source));
        if let Err(e) = refresher.reload().await {
            tracing::warn!(error = %e, "Initial route load failed, serving 503 until a refresh succeeds");
        }

        let chain = Arc::new(FilterChain::from_config(
            &config,
            collector.clone(),
            verifier,
            limiter.clone(),
        ));
        tracing::info!(filters = ?chain.names(), "Filter chain ready");

        let state = AppState {
            routes: refresher.table(),
            refresher: refresher.clone(),
            chain,
            collector: collector.clone(),
            client_ip: Arc::new(ClientIpResolver::new(&config.client_ip)),
            client: upstream_client(),
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            admin_api_key: Arc::from(config.admin.api_key.as_str()),
        };

        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(refresher.clone().run(
            Duration::from_secs(config.refresh.interval_secs),
            shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(limiter.run_sweeper(
            clock.clone(),
            Duration::from_secs(config.rate_limit.sweep_interval_secs),
            Duration::from_secs(config.rate_limit.idle_ttl_secs),
            shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(collector.run_sweeper(
            Duration::from_secs(config.metrics.sweep_interval_secs),
            shutdown.subscribe(),
        )));

        let watcher = match (&config.route_source.kind, &config.route_source.path) {
            (RouteSourceKind::File, Some(path)) if config.refresh.watch_file => {
                match RouteFileWatcher::new(Path::new(path), refresher.trigger()).run() {
                    Ok(watcher) => Some(watcher),
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "Route file watch unavailable, relying on interval refresh");
                        None
                    }
                }
            }
            _ => None,
        };

        let listener = bind(&config.listener.bind_address).await?;
        let address = local_addr(&listener, &config.listener.bind_address)?;
        let server = HttpServer::new(&config, state.clone());
        tasks.push(spawn_server("gateway", server, listener, &shutdown));

        let admin_address = if config.admin.enabled {
            let listener = bind(&config.admin.bind_address).await?;
            let admin_address = local_addr(&listener, &config.admin.bind_address)?;
            let server = HttpServer::admin(state.clone());
            tasks.push(spawn_server("admin", server, listener, &shutdown));
            Some(admin_address)
        } else {
            None
        };

        tracing::info!(
            address = %address,
            admin_address = ?admin_address,
            routes = state.routes.load().len(),
            "Gateway started"
        );

        Ok(GatewayHandle {
            address,
            admin_address,
            state,
            shutdown,
            tasks,
            _watcher: watcher,
        })
    }
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

fn local_addr(listener: &TcpListener, address: &str) -> Result<SocketAddr, StartupError> {
    listener.local_addr().map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

fn spawn_server(
    name: &'static str,
    server: HttpServer,
    listener: TcpListener,
    shutdown: &Shutdown,
) -> JoinHandle<()> {
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        let signal = async move {
            let _ = rx.recv().await;
        };
        if let Err(e) = server.run(listener, signal).await {
            tracing::error!(server = name, error = %e, "Server exited with error");
        }
    })
}

/// A running gateway.
pub struct GatewayHandle {
    address: SocketAddr,
    admin_address: Option<SocketAddr>,
    state: AppState,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl GatewayHandle {
    /// Address of the proxy listener.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn admin_address(&self) -> Option<SocketAddr> {
        self.admin_address
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.state.collector
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.state.refresher
    }

    /// Signal every task to stop and wait for them, up to a grace period.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down gateway");
        self.shutdown.trigger();

        let drain = join_tasks(self.tasks);
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Tasks still running after grace period"
            );
        }
        tracing::info!("Shutdown complete");
    }
}

async fn join_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }
}
