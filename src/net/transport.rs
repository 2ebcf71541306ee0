//! Outbound forwarding transport.
//!
//! # Responsibilities
//! - Define the seam between the dispatch core and the wire ([`Transport`])
//! - Hand out one transport per upstream authority ([`Connector`])
//! - Provide the hyper-backed implementation used in production
//!
//! # Design Decisions
//! - Transports are keyed by authority and shared by every slot of a backend
//! - Connect errors, upstream I/O errors and per-attempt timeouts all map to
//!   [`TransportError`]; the Dispatcher treats every variant as retryable
//! - Non-2xx upstream responses are NOT transport errors; they are relayed

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::config::TimeoutConfig;
use crate::net::upstream::Upstream;

/// Failure talking to an upstream.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connect to upstream failed: {0}")]
    Connect(String),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    #[error("upstream request failed: {0}")]
    Upstream(String),
}

/// Forwards an already-rewritten request to its upstream.
pub trait Transport: Send + Sync + fmt::Debug {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, TransportError>>;
}

/// Produces the transport bound to a given upstream authority.
pub trait Connector: Send + Sync + fmt::Debug {
    fn transport_for(&self, upstream: &Upstream) -> Arc<dyn Transport>;
}

/// Plain HTTP/1.1 transport on top of the hyper-util pooled client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    attempt_timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self {
            client,
            attempt_timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }
}

impl Transport for HttpTransport {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
        let attempt_timeout = self.attempt_timeout;
        let response_future = self.client.request(request);

        Box::pin(async move {
            match time::timeout(attempt_timeout, response_future).await {
                Ok(Ok(response)) => Ok(into_axum_response(response)),
                Ok(Err(e)) if e.is_connect() => Err(TransportError::Connect(e.to_string())),
                Ok(Err(e)) => Err(TransportError::Upstream(e.to_string())),
                Err(_) => Err(TransportError::Timeout(attempt_timeout)),
            }
        })
    }
}

fn into_axum_response(response: Response<hyper::body::Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

/// [`Connector`] that caches one [`HttpTransport`] per upstream authority.
#[derive(Debug)]
pub struct HttpTransportFactory {
    timeouts: TimeoutConfig,
    transports: DashMap<String, Arc<HttpTransport>>,
}

impl HttpTransportFactory {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            timeouts,
            transports: DashMap::new(),
        }
    }

    /// Number of distinct authorities a transport has been built for.
    pub fn cached(&self) -> usize {
        self.transports.len()
    }
}

impl Connector for HttpTransportFactory {
    fn transport_for(&self, upstream: &Upstream) -> Arc<dyn Transport> {
        self.transports
            .entry(upstream.authority().to_string())
            .or_insert_with(|| {
                tracing::debug!(upstream = %upstream, "Building upstream transport");
                Arc::new(HttpTransport::new(&self.timeouts))
            })
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fast_timeouts() -> TimeoutConfig {
        TimeoutConfig {
            connect_secs: 1,
            upstream_secs: 2,
            ..TimeoutConfig::default()
        }
    }

    #[test]
    fn factory_shares_transport_per_authority() {
        let factory = HttpTransportFactory::new(fast_timeouts());
        let a = Upstream::parse("127.0.0.1", 9001).unwrap();
        let b = Upstream::parse("127.0.0.1", 9002).unwrap();

        let _ = factory.transport_for(&a);
        let _ = factory.transport_for(&a);
        assert_eq!(factory.cached(), 1);

        let _ = factory.transport_for(&b);
        assert_eq!(factory.cached(), 2);
    }

    #[tokio::test]
    async fn forwards_and_relays_upstream_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy")
                .await;
            let _ = socket.shutdown().await;
        });

        let transport = HttpTransport::new(&fast_timeouts());
        let request = Request::builder()
            .uri(format!("http://{}/status", addr))
            .body(Body::empty())
            .unwrap();

        let response = transport.forward(request).await.unwrap();
        assert_eq!(response.status(), 503);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"busy");
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let transport = HttpTransport::new(&fast_timeouts());
        let request = Request::builder()
            .uri(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();

        let err = transport.forward(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {:?}", err);
    }
}
