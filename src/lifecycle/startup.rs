//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn router configuration into live routers and backends
//! - Register every router in the route table
//!
//! # Design Decisions
//! - A router whose claims conflict with an earlier one is skipped and
//!   reported; the remaining routers still start
//! - Backends with a non-positive `max_connections` are skipped with a warning
//! - A backend whose host cannot be parsed is skipped (validation reports it
//!   first when the config came from a file)

use std::sync::Arc;

use crate::config::{BackendConfig, RouterConfig};
use crate::load_balancer::{Backend, BackendRouter};
use crate::net::{Connector, Upstream};
use crate::routing::{RouteError, RouteTable};

/// Build one backend, or `None` if it must not serve traffic.
fn build_backend(router: &str, config: &BackendConfig, connector: &Arc<dyn Connector>) -> Option<Arc<Backend>> {
    if config.max_connections <= 0 {
        tracing::warn!(
            router = %router,
            host = %config.host,
            port = config.port,
            max_connections = config.max_connections,
            "Skipping backend with no connection capacity"
        );
        return None;
    }

    match Upstream::parse(&config.host, config.port) {
        Ok(upstream) => {
            let max_connections = usize::try_from(config.max_connections).unwrap_or(usize::MAX);
            Some(Arc::new(Backend::new(upstream, max_connections, connector.clone())))
        }
        Err(e) => {
            tracing::error!(router = %router, host = %config.host, port = config.port, error = %e, "Skipping invalid backend");
            None
        }
    }
}

/// Build a router and its backends from configuration.
pub fn build_router(index: usize, config: &RouterConfig, connector: &Arc<dyn Connector>) -> BackendRouter {
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| format!("router-{}", index));

    let mut router = BackendRouter::new(name, config.selection_method);
    for path in &config.accepted_paths {
        router = router.accept_path(path.as_str());
    }
    for (header, value) in &config.accepted_headers {
        router = router.accept_header(header.as_str(), value.as_str());
    }

    for backend in &config.backends {
        if let Some(backend) = build_backend(router.name(), backend, connector) {
            router.add_backend(backend);
        }
    }

    if router.backends().is_empty() {
        tracing::warn!(router = %router.name(), "Router has no usable backends; its requests will get 503");
    }
    router
}

/// Build the route table. Conflicting routers are left out and returned.
pub fn build_route_table(routers: &[RouterConfig], connector: Arc<dyn Connector>) -> (RouteTable, Vec<RouteError>) {
    let table = RouteTable::new();
    let mut rejected = Vec::new();

    for (index, config) in routers.iter().enumerate() {
        let router = Arc::new(build_router(index, config, &connector));
        if let Err(e) = table.register(router.clone()) {
            tracing::error!(router = %router.name(), error = %e, "Router registration rejected");
            rejected.push(e);
        }
    }

    tracing::info!(
        routers = table.routers().len(),
        backends = table.all_backends().len(),
        rejected = rejected.len(),
        "Route table built"
    );
    (table, rejected)
}
