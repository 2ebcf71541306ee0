//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding attempt fails:
//!     → retries.rs (policy decides: retry same slot / fail over / give up)
//!     → backoff.rs (delay before the next attempt)
//!     → give up: dispatcher marks the backend dead, answers 429
//! ```
//!
//! # Design Decisions
//! - Bounded: a request never retries more than `max_attempts` times
//! - Fixed delay by default; exponential with jitter is opt-in
//! - Retry state is request-scoped and passed explicitly

pub mod backoff;
pub mod retries;

pub use retries::{RetryAction, RetryContext, RetryPolicy, RetryPolicyKind};
