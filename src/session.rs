//! Session fields shared between the manager and the receive loop.
//!
//! `start` holds the manager's state lock for the whole identity handshake,
//! so anything the dispatcher must touch during that window lives here,
//! behind a short-held lock that is never kept across an await.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::signal::Signal;

/// Lifecycle phase of a [`SocketManager`](crate::SocketManager).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// No transport is open.
    #[default]
    Idle,
    /// Dialling the Nym client.
    Connecting,
    /// Transport open, waiting for the identity reply.
    AwaitingIdentity,
    /// Handshake complete; messages flow both ways.
    Ready,
    /// Teardown in progress.
    Closing,
}

#[derive(Debug, Default)]
pub(crate) struct SharedSession {
    fields: Mutex<Fields>,
}

#[derive(Debug, Default)]
struct Fields {
    identity: String,
    identity_waiter: Option<Signal>,
    phase: Phase,
}

impl SharedSession {
    fn fields(&self) -> MutexGuard<'_, Fields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn identity(&self) -> String { self.fields().identity.clone() }

    pub(crate) fn phase(&self) -> Phase { self.fields().phase }

    pub(crate) fn set_phase(&self, phase: Phase) { self.fields().phase = phase; }

    /// Install a fresh identity waiter for a start attempt.
    pub(crate) fn expect_identity(&self) -> Signal {
        let signal = Signal::new();
        self.fields().identity_waiter = Some(signal.clone());
        signal
    }

    /// Discard the waiter once the start attempt is over.
    pub(crate) fn clear_identity_waiter(&self) { self.fields().identity_waiter = None; }

    /// Store `address` and release a pending start, if any.
    ///
    /// Returns whether a waiter was released.
    pub(crate) fn record_identity(&self, address: String) -> bool {
        let mut fields = self.fields();
        fields.identity = address;
        match fields.identity_waiter.take() {
            Some(waiter) => {
                waiter.fire();
                true
            }
            None => false,
        }
    }
}
