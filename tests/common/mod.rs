//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use route_balancer::config::{BackendConfig, BalancerConfig, RouterConfig};
use route_balancer::load_balancer::{Backend, SelectionMethod};
use route_balancer::routing::RouteTable;
use route_balancer::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one request (headers plus any Content-Length body) off the socket.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable mock backend on `addr`. The closure receives the raw
/// request text and returns the status and body to answer with.
pub async fn start_programmable_backend_on<F, Fut>(addr: SocketAddr, f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let local = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    local
}

/// Start a programmable mock backend on a free port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    start_programmable_backend_on("127.0.0.1:0".parse().unwrap(), f).await
}

/// Start a mock backend that always answers 200 with `response`.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn backend(addr: SocketAddr, max_connections: i64) -> BackendConfig {
    BackendConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        max_connections,
    }
}

pub fn router(paths: &[&str], method: SelectionMethod, backends: Vec<BackendConfig>) -> RouterConfig {
    RouterConfig {
        selection_method: method,
        accepted_paths: paths.iter().map(|p| p.to_string()).collect(),
        backends,
        ..RouterConfig::default()
    }
}

/// Defaults tuned for tests: no background probes, fast retries.
pub fn test_config(routers: Vec<RouterConfig>) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.routers = routers;
    config.health_check.enabled = false;
    config.stats.enabled = false;
    config.observability.metrics_enabled = false;
    config.retries.backoff_ms = 10;
    config
}

/// A running balancer.
pub struct Balancer {
    pub addr: SocketAddr,
    pub routes: Arc<RouteTable>,
    pub shutdown: Shutdown,
}

impl Balancer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Balancer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the balancer on a free port and wait until it accepts connections.
pub async fn start_balancer(config: BalancerConfig) -> Balancer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config);
    let routes = server.routes().clone();
    let shutdown = Shutdown::new();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    Balancer { addr, routes, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait for every slot of `backend` to be checked back in.
///
/// The balancer drops a relayed body after its last byte is written, which
/// can land just after the client has read it.
pub async fn wait_until_idle(backend: &Backend) -> usize {
    for _ in 0..50 {
        if backend.in_use_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    backend.in_use_count()
}
