//! Forwarding slots.
//!
//! A [`BackendConnection`] is one admission slot of a backend: it carries the
//! upstream authority and the transport bound to it at creation. It does not
//! own a socket. Slots are checked out through [`BackendConnectionGuard`],
//! which checks the slot back in when dropped, so every exit path of a
//! forwarded request (success, error, cancellation, panic) releases it.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::net::{Transport, Upstream};

/// A single forwarding slot bound to one backend.
#[derive(Debug)]
pub struct BackendConnection {
    id: usize,
    upstream: Upstream,
    in_use: AtomicBool,
    transport: Arc<dyn Transport>,
}

impl BackendConnection {
    /// Create a slot that is already checked out.
    pub(crate) fn checked_out(id: usize, upstream: Upstream, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            upstream,
            in_use: AtomicBool::new(true),
            transport,
        }
    }

    /// Position of this slot in its backend's pool.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Flip `false → true`. Returns false if the slot was already taken.
    pub(crate) fn try_claim(&self) -> bool {
        self.in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.in_use.store(false, Ordering::Release);
    }
}

/// RAII handle for a checked-out slot.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    connection: Arc<BackendConnection>,
}

impl BackendConnectionGuard {
    pub(crate) fn new(connection: Arc<BackendConnection>) -> Self {
        Self { connection }
    }
}

impl Deref for BackendConnectionGuard {
    type Target = BackendConnection;
    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.connection.release();
        tracing::trace!(
            backend = %self.connection.upstream.authority(),
            slot = self.connection.id,
            "Slot released"
        );
    }
}
