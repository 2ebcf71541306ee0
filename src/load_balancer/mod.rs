//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → BackendRouter identified
//!     → router.rs (draw candidates, skip dead backends, bounded draws)
//!     → Apply selection policy:
//!         - round_robin.rs (rotate through backends)
//!         - random.rs (uniform draw)
//!         - least_in_use.rs (pick backend with fewest checked-out slots)
//!     → backend.rs (check out a slot from the pool)
//!     → connection.rs (guard checks the slot back in on drop)
//! ```
//!
//! # Design Decisions
//! - Policies are stateless apart from the round-robin cursor
//! - Selection reads liveness but never writes it
//! - Slot acquisition fails fast; there is no waiting for capacity

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod connection;
pub mod least_in_use;
pub mod random;
pub mod round_robin;
pub mod router;

pub use backend::Backend;
pub use connection::{BackendConnection, BackendConnectionGuard};
pub use router::BackendRouter;

/// Errors raised while picking a backend or checking out a slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadBalancerError {
    #[error("no live backend available for router {router}")]
    NoBackendAvailable { router: String },
    #[error("backend {backend} has no free connection slot")]
    PoolExhausted { backend: String },
}

/// Draws one candidate backend. Liveness filtering is up to the caller
/// unless the policy says otherwise.
pub trait SelectionPolicy: Send + Sync + fmt::Debug {
    fn candidate(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

/// Named selection policies, as they appear in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum SelectionMethod {
    RoundRobin,
    #[default]
    Random,
    LeastInUse,
}

impl SelectionMethod {
    /// Case-insensitive parse. Unknown or empty names fall back to `Random`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "roundrobin" | "round_robin" => SelectionMethod::RoundRobin,
            "inuseconnection" | "least_in_use" => SelectionMethod::LeastInUse,
            "random" => SelectionMethod::Random,
            other => {
                if !other.is_empty() {
                    tracing::warn!(method = %other, "Unknown selection method, using random");
                }
                SelectionMethod::Random
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::RoundRobin => "roundrobin",
            SelectionMethod::Random => "random",
            SelectionMethod::LeastInUse => "inuseconnection",
        }
    }

    pub fn build(self) -> Box<dyn SelectionPolicy> {
        match self {
            SelectionMethod::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            SelectionMethod::Random => Box::new(random::RandomChoice::new()),
            SelectionMethod::LeastInUse => Box::new(least_in_use::LeastInUse::new()),
        }
    }
}

impl From<String> for SelectionMethod {
    fn from(name: String) -> Self {
        SelectionMethod::parse(&name)
    }
}

impl From<SelectionMethod> for String {
    fn from(method: SelectionMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
