//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers)
//!     → table.rs (route lookup)
//!     → matcher.rs (normalize, longest prefix)
//!     → Return: BackendRouter or NotFound
//!
//! Registration (at startup):
//!     BackendRouter (paths, headers)
//!     → conflict check against existing claims
//!     → insert all claims, or none
//! ```
//!
//! # Design Decisions
//! - Path resolution is the primary strategy; header lookup is secondary
//! - No regex in hot path (prefix matching only)
//! - Deterministic: longest prefix wins when several match

use thiserror::Error;

pub mod matcher;
pub mod table;

pub use table::RouteTable;

/// Errors raised by the route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no router claims path {path}")]
    NotFound { path: String },
    #[error("no router claims header {name}: {value}")]
    HeaderNotFound { name: String, value: String },
    #[error("path prefix {path} already registered by router {owner}")]
    PathConflict { path: String, owner: String },
    #[error("header {name}: {value} already registered by router {owner}")]
    HeaderConflict { name: String, value: String, owner: String },
}
