//! In-process transports for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use futures_util::future::BoxFuture;

use crate::net::{Connector, Transport, TransportError, Upstream};

/// What a scripted transport saw for one forwarding attempt.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Default)]
struct ScriptState {
    failures_before_success: usize,
    delay: Option<Duration>,
    endless_body: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

/// Fails the first N attempts, then answers 200 with the target authority as body.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<ScriptState>,
}

impl ScriptedTransport {
    pub fn healthy() -> Self {
        Self::failing(0)
    }

    pub fn always_failing() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn failing(failures_before_success: usize) -> Self {
        Self {
            state: Arc::new(ScriptState {
                failures_before_success,
                ..ScriptState::default()
            }),
        }
    }

    pub fn with_delay(failures_before_success: usize, delay: Duration) -> Self {
        Self {
            state: Arc::new(ScriptState {
                failures_before_success,
                delay: Some(delay),
                ..ScriptState::default()
            }),
        }
    }

    /// Answers 200 with a body that never ends.
    pub fn endless_body() -> Self {
        Self {
            state: Arc::new(ScriptState {
                endless_body: true,
                ..ScriptState::default()
            }),
        }
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
        let state = self.state.clone();
        Box::pin(async move {
            let call = state.calls.fetch_add(1, Ordering::SeqCst);
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            let authority = parts
                .uri
                .authority()
                .map(|a| a.to_string())
                .unwrap_or_default();
            state.seen.lock().unwrap().push(SeenRequest {
                method: parts.method,
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });

            if let Some(delay) = state.delay {
                tokio::time::sleep(delay).await;
            }
            if call < state.failures_before_success {
                return Err(TransportError::Connect(format!("scripted failure #{}", call + 1)));
            }
            if state.endless_body {
                let pending = futures_util::stream::pending::<Result<Bytes, std::io::Error>>();
                return Ok(Response::new(Body::from_stream(pending)));
            }
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("connection", "keep-alive")
                .body(Body::from(authority))
                .unwrap())
        })
    }
}

/// Hands out scripted transports, optionally different per authority.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    default: ScriptedTransport,
    per_authority: Mutex<HashMap<String, ScriptedTransport>>,
    built: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(default: ScriptedTransport) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    pub fn with(self, authority: &str, transport: ScriptedTransport) -> Self {
        self.per_authority
            .lock()
            .unwrap()
            .insert(authority.to_string(), transport);
        self
    }

    /// How many slots asked for a transport.
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn transport_for(&self, upstream: &Upstream) -> Arc<dyn Transport> {
        self.built.fetch_add(1, Ordering::SeqCst);
        let transport = self
            .per_authority
            .lock()
            .unwrap()
            .get(upstream.authority().as_str())
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Arc::new(transport)
    }
}
