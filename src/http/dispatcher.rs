//! Request dispatch.
//!
//! # Responsibilities
//! - Resolve the router for an inbound request (path, then optionally headers)
//! - Select a live backend and check out one of its slots
//! - Forward through the slot's transport, retrying per the retry policy
//! - Mark the backend dead when the retry budget is spent
//!
//! # Design Decisions
//! - The slot is an RAII guard: it is released exactly once on every exit
//!   path, including a dropped (cancelled) dispatch future
//! - On success the guard moves into the relayed body, so the slot stays
//!   checked out while the upstream body streams to the client
//! - The inbound body is buffered once so every attempt sends the same bytes
//! - Upstream responses are relayed whatever their status; only transport
//!   failures are retried

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_LENGTH;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Response};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::time;
use tracing::Instrument;

use crate::config::DispatchConfig;
use crate::http::{request, response};
use crate::load_balancer::{Backend, BackendConnectionGuard, BackendRouter, LoadBalancerError};
use crate::observability::metrics;
use crate::resilience::{RetryAction, RetryContext, RetryPolicy};
use crate::routing::{RouteError, RouteTable};

/// Why a request could not be served by an upstream.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Balancer(#[from] LoadBalancerError),

    #[error("backend {backend} failed after {attempts} forwarding attempts")]
    RetriesExhausted { backend: String, attempts: u32 },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    RequestBody(String),

    #[error("cannot build upstream request: {0}")]
    InvalidUpstreamRequest(String),
}

impl DispatchError {
    /// Backend label for metrics.
    fn backend(&self) -> &str {
        match self {
            DispatchError::Balancer(LoadBalancerError::PoolExhausted { backend }) => backend.as_str(),
            DispatchError::RetriesExhausted { backend, .. } => backend.as_str(),
            _ => "none",
        }
    }
}

/// Drives one request through resolve → select → acquire → forward.
#[derive(Debug)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    retry_policy: Arc<dyn RetryPolicy>,
    settings: DispatchConfig,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, retry_policy: Arc<dyn RetryPolicy>, settings: DispatchConfig) -> Self {
        Self {
            routes,
            retry_policy,
            settings,
        }
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Serve one request. Never fails: errors become their status response.
    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let request_id = request::request_id(request.headers()).to_string();
        let span = tracing::info_span!("dispatch", request_id = %request_id, method = %method, path = %path);

        match self.try_dispatch(request).instrument(span).await {
            Ok((response, backend)) => {
                metrics::record_request(&method, response.status().as_u16(), &backend, start);
                response
            }
            Err(e) => {
                let status = e.status();
                // Exhaustion is already logged at error level by the retry loop.
                if !matches!(e, DispatchError::RetriesExhausted { .. }) {
                    tracing::warn!(request_id = %request_id, path = %path, status = %status, error = %e, "Request rejected");
                }
                metrics::record_request(&method, status.as_u16(), e.backend(), start);
                e.into_response()
            }
        }
    }

    /// Map a request to its router: path prefix first, then header claims
    /// when `header_fallback` is on.
    pub fn resolve(&self, parts: &Parts) -> Result<Arc<BackendRouter>, RouteError> {
        match self.routes.resolve_by_path(parts.uri.path()) {
            Ok(router) => Ok(router),
            Err(not_found) if self.settings.header_fallback => self
                .routes
                .resolve_by_headers(&parts.headers)
                .ok_or(not_found),
            Err(e) => Err(e),
        }
    }

    async fn try_dispatch(&self, request: Request<Body>) -> Result<(Response<Body>, String), DispatchError> {
        let (parts, body) = request.into_parts();

        let router = self.resolve(&parts)?;
        let mut backend = router.select_backend()?;
        let body = self.buffer_body(&parts.headers, body).await?;
        let mut slot = acquire(&backend)?;

        tracing::debug!(
            router = %router.name(),
            backend = %backend.authority(),
            slot = slot.id(),
            "Forwarding request"
        );

        let mut ctx = RetryContext::new();
        loop {
            let outbound = request::prepare_upstream_request(&parts, body.clone(), backend.upstream())?;

            let error = match slot.transport().forward(outbound).await {
                Ok(upstream_response) => {
                    tracing::debug!(
                        backend = %backend.authority(),
                        status = %upstream_response.status(),
                        retries = ctx.attempt(),
                        "Upstream responded"
                    );
                    let authority = backend.authority().to_string();
                    return Ok((response::from_upstream(upstream_response, slot), authority));
                }
                Err(error) => error,
            };

            match self.retry_policy.on_failure(&ctx, &error) {
                RetryAction::Retry { delay } => {
                    tracing::warn!(
                        backend = %backend.authority(),
                        attempt = ctx.attempt() + 1,
                        max_attempts = self.retry_policy.max_attempts(),
                        ?delay,
                        error = %error,
                        "Forwarding failed, retrying"
                    );
                    metrics::record_retry(backend.authority());
                    time::sleep(delay).await;
                    ctx.record_retry();
                }
                RetryAction::Failover { delay } => {
                    tracing::warn!(
                        backend = %backend.authority(),
                        attempt = ctx.attempt() + 1,
                        max_attempts = self.retry_policy.max_attempts(),
                        ?delay,
                        error = %error,
                        "Forwarding failed, failing over"
                    );
                    metrics::record_retry(backend.authority());
                    drop(slot);
                    time::sleep(delay).await;
                    ctx.record_retry();
                    backend = router.select_backend()?;
                    slot = acquire(&backend)?;
                }
                RetryAction::GiveUp => {
                    backend.set_alive(false);
                    metrics::record_backend_alive(backend.authority(), false);
                    tracing::error!(
                        router = %router.name(),
                        backend = %backend.authority(),
                        attempts = ctx.attempt() + 1,
                        error = %error,
                        "Retries exhausted, backend marked dead"
                    );
                    return Err(DispatchError::RetriesExhausted {
                        backend: backend.authority().to_string(),
                        attempts: ctx.attempt() + 1,
                    });
                }
            }
        }
    }

    /// Read the whole inbound body, refusing anything above `max_body_bytes`.
    async fn buffer_body(&self, headers: &HeaderMap, body: Body) -> Result<Bytes, DispatchError> {
        let limit = self.settings.max_body_bytes;

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(DispatchError::PayloadTooLarge { limit });
        }

        let mut stream = body.into_data_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DispatchError::RequestBody(e.to_string()))?;
            if buffer.len() + chunk.len() > limit {
                return Err(DispatchError::PayloadTooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buffer))
    }
}

fn acquire(backend: &Backend) -> Result<BackendConnectionGuard, DispatchError> {
    backend.acquire_connection().map_err(|e| {
        metrics::record_pool_exhausted(backend.authority());
        tracing::warn!(
            backend = %backend.authority(),
            max_connections = backend.max_connections(),
            "Backend pool exhausted"
        );
        e.into()
    })
}
