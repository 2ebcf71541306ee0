//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → TCP connect to each backend (bounded by timeout)
//!     → Backend liveness flag
//!
//! Request path:
//!     Retries exhausted → Dispatcher marks backend dead
//!     (revived by the next successful probe)
//! ```
//!
//! # Design Decisions
//! - Liveness is advisory and per-backend; the last writer wins
//! - Selection skips dead backends but never changes liveness itself

pub mod active;

pub use active::HealthMonitor;
