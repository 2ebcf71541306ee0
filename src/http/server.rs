//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatch handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Start the background loops (health monitor, stats reporter)
//! - Serve plain TCP or TLS until shutdown

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::BalancerConfig;
use crate::health::HealthMonitor;
use crate::http::dispatcher::Dispatcher;
use crate::http::request::UuidRequestId;
use crate::lifecycle::{build_route_table, Shutdown};
use crate::net::{Connector, HttpTransportFactory};
use crate::observability::StatsReporter;
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    routes: Arc<RouteTable>,
}

impl HttpServer {
    /// Create a server that forwards over plain HTTP.
    pub fn new(config: BalancerConfig) -> Self {
        let connector = Arc::new(HttpTransportFactory::new(config.timeouts.clone()));
        Self::with_connector(config, connector)
    }

    /// Create a server whose backends get their transports from `connector`.
    pub fn with_connector(config: BalancerConfig, connector: Arc<dyn Connector>) -> Self {
        let (routes, rejected) = build_route_table(&config.routers, connector);
        if !rejected.is_empty() {
            tracing::warn!(rejected = rejected.len(), "Some routers were not registered");
        }
        let routes = Arc::new(routes);

        let retry_policy = config.retries.policy.build(&config.retries);
        let dispatcher = Arc::new(Dispatcher::new(routes.clone(), retry_policy, config.dispatch.clone()));

        let router = Self::build_router(&config, AppState { dispatcher });
        Self {
            router,
            config,
            routes,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &BalancerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Start the health monitor and stats reporter.
    fn spawn_background(&self, shutdown: &Shutdown) {
        let monitor = HealthMonitor::new(self.routes.clone(), self.config.health_check.clone());
        tokio::spawn(monitor.run(shutdown.subscribe()));

        let stats = StatsReporter::new(self.routes.clone(), self.config.stats.clone());
        tokio::spawn(stats.run(shutdown.subscribe()));
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background(&shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr` until `shutdown` is triggered.
    pub async fn run_tls(self, addr: SocketAddr, tls: RustlsConfig, shutdown: Shutdown) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background(&shutdown);

        let handle = axum_server::Handle::new();
        let drain = Duration::from_secs(self.config.timeouts.request_secs);
        let mut stop = shutdown.subscribe();
        let stopper = handle.clone();
        tokio::spawn(async move {
            let _ = stop.recv().await;
            stopper.graceful_shutdown(Some(drain));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// The route table this server dispatches through.
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }
}

/// Catch-all handler: every method, every path.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    state.dispatcher.dispatch(request).await
}
