//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     TcpListener (plain) or tls.rs (rustls via axum-server)
//!     → Hand off to HTTP layer
//!
//! Outbound:
//!     Backend config (host, port)
//!     → upstream.rs (normalize to scheme + authority)
//!     → transport.rs (authority-keyed forwarding transport)
//! ```
//!
//! # Design Decisions
//! - TLS termination is optional and handled transparently by the listener
//! - Outbound transports are built once per authority and reused
//! - The core only sees the `Transport`/`Connector` traits

pub mod tls;
pub mod transport;
pub mod upstream;

pub use transport::{Connector, HttpTransport, HttpTransportFactory, Transport, TransportError};
pub use upstream::{Upstream, UpstreamError};
