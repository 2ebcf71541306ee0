//! Backend routers.
//!
//! # Responsibilities
//! - Own the ordered backend set serving one class of requests
//! - Declare the path prefixes and header pairs that class is matched by
//! - Pick a live backend through the configured selection policy
//!
//! # Design Decisions
//! - At most [`MAX_SELECTION_DRAWS`] candidates are drawn per request, so a
//!   router full of dead backends fails fast instead of scanning
//! - An empty backend set is an explicit error, never a panic
//! - Backends may be added after construction (under the write lock)

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::load_balancer::{Backend, LoadBalancerError, SelectionMethod, SelectionPolicy};

/// Candidate draws per selection before giving up.
pub const MAX_SELECTION_DRAWS: usize = 5;

#[derive(Debug)]
pub struct BackendRouter {
    name: String,
    method: SelectionMethod,
    policy: Box<dyn SelectionPolicy>,
    accepted_paths: BTreeSet<String>,
    accepted_headers: BTreeMap<String, String>,
    backends: RwLock<Vec<Arc<Backend>>>,
}

impl BackendRouter {
    pub fn new(name: impl Into<String>, method: SelectionMethod) -> Self {
        Self {
            name: name.into(),
            method,
            policy: method.build(),
            accepted_paths: BTreeSet::new(),
            accepted_headers: BTreeMap::new(),
            backends: RwLock::new(Vec::new()),
        }
    }

    /// Claim a path prefix.
    pub fn accept_path(mut self, prefix: impl Into<String>) -> Self {
        self.accepted_paths.insert(prefix.into());
        self
    }

    /// Claim a header name/value pair.
    pub fn accept_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.accepted_headers.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    pub fn accepted_paths(&self) -> impl Iterator<Item = &str> {
        self.accepted_paths.iter().map(String::as_str)
    }

    pub fn accepted_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.accepted_headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn add_backend(&self, backend: Arc<Backend>) {
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(backend);
    }

    /// Snapshot of the backend set, in configuration order.
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.backends.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Pick a live backend.
    pub fn select_backend(&self) -> Result<Arc<Backend>, LoadBalancerError> {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);

        if !backends.is_empty() {
            for _ in 0..MAX_SELECTION_DRAWS {
                match self.policy.candidate(&backends) {
                    Some(backend) if backend.is_alive() => return Ok(backend),
                    Some(_) => continue,
                    None => break,
                }
            }
        }

        tracing::debug!(router = %self.name, backend_count = backends.len(), "No live backend found");
        Err(LoadBalancerError::NoBackendAvailable {
            router: self.name.clone(),
        })
    }
}
