//! Retry policies.
//!
//! # Responsibilities
//! - Carry the per-request attempt count ([`RetryContext`])
//! - Decide, after a forwarding failure, whether and how to try again
//!
//! # Design Decisions
//! - The dispatcher owns the state machine; the policy only answers
//!   "retry, fail over, or give up" so policies can be swapped freely
//! - Only transport failures reach the policy; upstream status codes
//!   (including 5xx) are relayed as-is
//! - Exhaustion is final: the dispatcher marks the backend dead and answers 429

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::net::TransportError;
use crate::resilience::backoff::Backoff;

/// Request-scoped retry state, threaded explicitly through dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryContext {
    attempt: u32,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries performed so far for this request.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn record_retry(&mut self) {
        self.attempt += 1;
    }
}

/// What to do after a failed forwarding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Wait, then forward again through the same slot.
    Retry { delay: Duration },
    /// Wait, release the slot and go back through backend selection.
    Failover { delay: Duration },
    /// Stop; the request fails.
    GiveUp,
}

pub trait RetryPolicy: Send + Sync + fmt::Debug {
    fn on_failure(&self, ctx: &RetryContext, error: &TransportError) -> RetryAction;

    /// Upper bound on retries, for logging.
    fn max_attempts(&self) -> u32;
}

/// Retry the same slot until the bound, then give up.
#[derive(Debug, Clone)]
pub struct SameConnectionRetry {
    max_attempts: u32,
    backoff: Backoff,
}

impl SameConnectionRetry {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self { max_attempts, backoff }
    }
}

impl RetryPolicy for SameConnectionRetry {
    fn on_failure(&self, ctx: &RetryContext, _error: &TransportError) -> RetryAction {
        if ctx.attempt() < self.max_attempts {
            RetryAction::Retry {
                delay: self.backoff.delay_for(ctx.attempt() + 1),
            }
        } else {
            RetryAction::GiveUp
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Re-select a backend on every failure until the bound, then give up.
#[derive(Debug, Clone)]
pub struct FailoverRetry {
    max_attempts: u32,
    backoff: Backoff,
}

impl FailoverRetry {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self { max_attempts, backoff }
    }
}

impl RetryPolicy for FailoverRetry {
    fn on_failure(&self, ctx: &RetryContext, _error: &TransportError) -> RetryAction {
        if ctx.attempt() < self.max_attempts {
            RetryAction::Failover {
                delay: self.backoff.delay_for(ctx.attempt() + 1),
            }
        } else {
            RetryAction::GiveUp
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Retry policy names, as they appear in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicyKind {
    #[default]
    SameConnection,
    Failover,
}

impl RetryPolicyKind {
    pub fn build(self, config: &RetryConfig) -> Arc<dyn RetryPolicy> {
        let backoff = if config.exponential {
            Backoff::Exponential {
                base_ms: config.backoff_ms,
                max_ms: config.max_backoff_ms.max(config.backoff_ms),
            }
        } else {
            Backoff::Fixed(Duration::from_millis(config.backoff_ms))
        };

        match self {
            RetryPolicyKind::SameConnection => Arc::new(SameConnectionRetry::new(config.max_attempts, backoff)),
            RetryPolicyKind::Failover => Arc::new(FailoverRetry::new(config.max_attempts, backoff)),
        }
    }
}
