//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream `host:port`
//! - Own a bounded pool of forwarding slots (grows lazily, never shrinks)
//! - Enforce the `max_connections` admission ceiling
//! - Track the advisory liveness flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

use crate::load_balancer::connection::{BackendConnection, BackendConnectionGuard};
use crate::load_balancer::LoadBalancerError;
use crate::net::{Connector, Upstream};

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    upstream: Upstream,
    /// Maximum concurrently checked-out slots. Zero disables the backend.
    max_connections: usize,
    connector: Arc<dyn Connector>,
    /// Pool membership. Guards scan-and-claim and growth; not held while forwarding.
    connections: Mutex<Vec<Arc<BackendConnection>>>,
    alive: AtomicBool,
}

impl Backend {
    /// Create a new backend. Backends start out alive.
    pub fn new(upstream: Upstream, max_connections: usize, connector: Arc<dyn Connector>) -> Self {
        Self {
            upstream,
            max_connections,
            connector,
            connections: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
        }
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// `host:port`, the backend's identity.
    pub fn authority(&self) -> &str {
        self.upstream.authority().as_str()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Check out a free slot, growing the pool if it is below the ceiling.
    ///
    /// Never waits: a saturated backend fails with
    /// [`LoadBalancerError::PoolExhausted`].
    pub fn acquire_connection(&self) -> Result<BackendConnectionGuard, LoadBalancerError> {
        let mut pool = self.connections.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(free) = pool.iter().find(|conn| conn.try_claim()) {
            return Ok(BackendConnectionGuard::new(free.clone()));
        }

        if pool.len() < self.max_connections {
            let transport = self.connector.transport_for(&self.upstream);
            let conn = Arc::new(BackendConnection::checked_out(
                pool.len(),
                self.upstream.clone(),
                transport,
            ));
            pool.push(conn.clone());
            tracing::debug!(backend = %self.authority(), pool_size = pool.len(), "Grew slot pool");
            return Ok(BackendConnectionGuard::new(conn));
        }

        Err(LoadBalancerError::PoolExhausted {
            backend: self.authority().to_string(),
        })
    }

    /// Check a slot back in. Equivalent to dropping the guard.
    pub fn release_connection(&self, guard: BackendConnectionGuard) {
        drop(guard);
    }

    /// Number of slots currently checked out.
    pub fn in_use_count(&self) -> usize {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|conn| conn.is_in_use())
            .count()
    }

    /// Number of slots ever created.
    pub fn pool_size(&self) -> usize {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    // --- Liveness ---

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Set liveness. Last writer wins. Returns true if the flag changed.
    pub fn set_alive(&self, alive: bool) -> bool {
        let previous = self.alive.swap(alive, Ordering::AcqRel);
        if previous != alive {
            if alive {
                tracing::info!(backend = %self.authority(), "Backend marked alive");
            } else {
                tracing::warn!(backend = %self.authority(), "Backend marked dead");
            }
        }
        previous != alive
    }

    /// Connectivity probe: a bare TCP connect with a deadline.
    ///
    /// The only observable effect is the liveness flag; the outcome is also
    /// returned for logging and metrics.
    pub async fn check_health(&self, timeout: Duration) -> bool {
        let alive = match time::timeout(timeout, TcpStream::connect(self.authority())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::warn!(backend = %self.authority(), error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(backend = %self.authority(), ?timeout, "Health check failed: timeout");
                false
            }
        };
        self.set_alive(alive);
        alive
    }
}
