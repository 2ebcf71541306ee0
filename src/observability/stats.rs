//! Periodic pool statistics.
//!
//! Every tick, logs and exports `in_use` and `pool_size` for every backend.
//! Read-only: the loop never changes pool or liveness state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::StatsConfig;
use crate::observability::metrics;
use crate::routing::RouteTable;

pub struct StatsReporter {
    routes: Arc<RouteTable>,
    config: StatsConfig,
}

impl StatsReporter {
    pub fn new(routes: Arc<RouteTable>, config: StatsConfig) -> Self {
        Self { routes, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Stats reporting disabled");
            return;
        }

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval(interval);
        // The first tick completes immediately; report after one full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.report();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Stats reporter received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Log and export one snapshot of every backend's pool.
    pub fn report(&self) {
        for router in self.routes.routers() {
            for backend in router.backends() {
                let in_use = backend.in_use_count();
                let pool_size = backend.pool_size();
                tracing::info!(
                    router = %router.name(),
                    backend = %backend.authority(),
                    in_use,
                    pool_size,
                    alive = backend.is_alive(),
                    "Backend pool stats"
                );
                metrics::record_pool_stats(backend.authority(), in_use, pool_size);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{Backend, BackendRouter, SelectionMethod};
    use crate::net::Upstream;
    use crate::test_support::ScriptedConnector;

    fn table() -> (Arc<RouteTable>, Arc<Backend>) {
        let backend = Arc::new(Backend::new(
            Upstream::parse("127.0.0.1", 9100).unwrap(),
            2,
            Arc::new(ScriptedConnector::default()),
        ));
        let router = BackendRouter::new("stats", SelectionMethod::RoundRobin).accept_path("/s");
        router.add_backend(backend.clone());
        let table = RouteTable::new();
        table.register(Arc::new(router)).unwrap();
        (Arc::new(table), backend)
    }

    #[test]
    fn report_does_not_mutate_pool_or_liveness() {
        let (routes, backend) = table();
        let _held = backend.acquire_connection().unwrap();
        backend.set_alive(false);

        StatsReporter::new(routes, StatsConfig::default()).report();

        assert_eq!(backend.in_use_count(), 1);
        assert_eq!(backend.pool_size(), 1);
        assert!(!backend.is_alive());
    }

    #[tokio::test]
    async fn loop_exits_on_shutdown() {
        let (routes, _) = table();
        let (tx, rx) = broadcast::channel(1);
        let config = StatsConfig { enabled: true, interval_secs: 1 };
        let handle = tokio::spawn(StatsReporter::new(routes, config).run(rx));

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
