//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → dispatcher.rs (route table → router → backend → slot)
//!     → request.rs (rewrite for the chosen upstream)
//!     → [transport forwards, retry policy on failure]
//!     → response.rs (relay upstream response, or map the failure to a status)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{DispatchError, Dispatcher};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
