//! HTTP load balancer library.
//!
//! Requests are classified by path prefix (or header) through the route
//! table, handed to a backend router that picks a live backend, and
//! forwarded through one of that backend's bounded slots with retries.

pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod health;
pub mod load_balancer;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::BalancerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
