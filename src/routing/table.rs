//! Route table.
//!
//! # Responsibilities
//! - Map path prefixes and header (name, value) pairs to backend routers
//! - Reject overlapping claims at registration
//! - Resolve a request path or header to its router
//!
//! # Design Decisions
//! - Registration is all-or-nothing per router: the conflict check and the
//!   inserts happen under one write lock
//! - Populated at startup; lookups only take the read lock
//! - Explicit NotFound rather than a silent default router

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::http::HeaderMap;

use crate::load_balancer::{Backend, BackendRouter};
use crate::routing::matcher::{longest_prefix_match, normalize_header_name, normalize_path};
use crate::routing::RouteError;

#[derive(Debug, Default)]
struct Routes {
    by_path: HashMap<String, Arc<BackendRouter>>,
    /// header name → header value → router
    by_header: HashMap<String, HashMap<String, Arc<BackendRouter>>>,
    routers: Vec<Arc<BackendRouter>>,
}

/// Owns every registered router. Shared via `Arc` by the dispatcher and the
/// background loops.
#[derive(Debug, Default)]
pub struct RouteTable {
    inner: RwLock<Routes>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every path prefix and header pair claimed by `router`.
    ///
    /// Fails without inserting anything if any claim is already held by a
    /// different router.
    pub fn register(&self, router: Arc<BackendRouter>) -> Result<(), RouteError> {
        let mut routes = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let paths: Vec<String> = router.accepted_paths().map(normalize_path).collect();
        let headers: Vec<(String, String)> = router
            .accepted_headers()
            .map(|(name, value)| (normalize_header_name(name), value.to_string()))
            .collect();

        for path in &paths {
            if let Some(owner) = routes.by_path.get(path) {
                if !Arc::ptr_eq(owner, &router) {
                    return Err(RouteError::PathConflict {
                        path: path.clone(),
                        owner: owner.name().to_string(),
                    });
                }
            }
        }
        for (name, value) in &headers {
            if let Some(owner) = routes.by_header.get(name).and_then(|values| values.get(value)) {
                if !Arc::ptr_eq(owner, &router) {
                    return Err(RouteError::HeaderConflict {
                        name: name.clone(),
                        value: value.clone(),
                        owner: owner.name().to_string(),
                    });
                }
            }
        }

        for path in paths {
            routes.by_path.insert(path, router.clone());
        }
        for (name, value) in headers {
            routes
                .by_header
                .entry(name)
                .or_default()
                .insert(value, router.clone());
        }
        if !routes.routers.iter().any(|r| Arc::ptr_eq(r, &router)) {
            routes.routers.push(router.clone());
        }

        tracing::info!(
            router = %router.name(),
            method = %router.method(),
            paths = routes.by_path.values().filter(|r| Arc::ptr_eq(r, &router)).count(),
            "Router registered"
        );
        Ok(())
    }

    /// Resolve the router claiming the longest prefix of `path`.
    pub fn resolve_by_path(&self, path: &str) -> Result<Arc<BackendRouter>, RouteError> {
        let routes = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let normalized = normalize_path(path);
        longest_prefix_match(&routes.by_path, &normalized)
            .map(|(_, router)| router.clone())
            .ok_or_else(|| RouteError::NotFound { path: path.to_string() })
    }

    /// Exact lookup of a header pair.
    pub fn resolve_by_header(&self, name: &str, value: &str) -> Result<Arc<BackendRouter>, RouteError> {
        let routes = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        routes
            .by_header
            .get(&normalize_header_name(name))
            .and_then(|values| values.get(value))
            .cloned()
            .ok_or_else(|| RouteError::HeaderNotFound {
                name: name.to_string(),
                value: value.to_string(),
            })
    }

    /// First inbound header whose (name, value) pair is claimed.
    pub fn resolve_by_headers(&self, headers: &HeaderMap) -> Option<Arc<BackendRouter>> {
        headers.iter().find_map(|(name, value)| {
            let value = value.to_str().ok()?;
            self.resolve_by_header(name.as_str(), value).ok()
        })
    }

    pub fn routers(&self) -> Vec<Arc<BackendRouter>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routers
            .clone()
    }

    /// Every backend of every registered router.
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.routers()
            .iter()
            .flat_map(|router| router.backends())
            .collect()
    }
}
