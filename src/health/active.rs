//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend with a bounded TCP connect
//! - Update backend liveness from the result
//!
//! # Design Decisions
//! - All backends are probed concurrently each tick, so one slow backend
//!   does not delay the rest
//! - Probes only ever touch the liveness flag, never the slot pool

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::observability::metrics;
use crate::routing::RouteTable;

pub struct HealthMonitor {
    routes: Arc<RouteTable>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(routes: Arc<RouteTable>, config: HealthCheckConfig) -> Self {
        Self { routes, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once. Returns how many are alive.
    pub async fn check_all(&self) -> usize {
        let backends = self.routes.all_backends();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let results = join_all(backends.iter().map(|backend| async move {
            let alive = backend.check_health(timeout).await;
            metrics::record_backend_alive(backend.authority(), alive);
            alive
        }))
        .await;

        let alive = results.iter().filter(|alive| **alive).count();
        tracing::debug!(backends = backends.len(), alive, "Health check round complete");
        alive
    }
}
