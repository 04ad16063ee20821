//! Fire-once notifications shared between the manager and its tasks.
//!
//! Every handshake and shutdown rendezvous in this crate is a one-shot
//! notification: the identity reply unblocking `start`, the receive loop
//! reporting that it has terminated, and the manager announcing that a
//! session has stopped. [`Signal`] models all three. Firing is idempotent, so
//! no caller ever needs to know whether another party fired first.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A notification that fires at most once.
///
/// Clones observe the same underlying state.
///
/// # Examples
///
/// ```
/// use nym_socket::signal::Signal;
///
/// let signal = Signal::new();
/// let observer = signal.clone();
/// signal.fire();
/// signal.fire();
/// assert!(observer.is_fired());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Signal(CancellationToken);

impl Signal {
    /// Create a pending signal.
    #[must_use]
    pub fn new() -> Self { Self(CancellationToken::new()) }

    /// Fire the signal, waking all waiters. Later calls are no-ops.
    pub fn fire(&self) { self.0.cancel(); }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool { self.0.is_cancelled() }

    /// Wait until the signal fires.
    pub async fn fired(&self) { self.0.cancelled().await; }

    /// Wait until the signal fires or `limit` elapses.
    ///
    /// Returns `true` when the signal fired within the limit.
    pub async fn fired_within(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.fired()).await.is_ok()
    }
}

/// Read-only view of a session's stopped notification.
///
/// Returned by [`SocketManager::start`](crate::SocketManager::start) when a
/// new session is established. It fires once the session has been fully torn
/// down, whether through [`stop`](crate::SocketManager::stop) or because the
/// peer ended the connection.
#[derive(Clone, Debug)]
pub struct StoppedSignal(Signal);

impl StoppedSignal {
    pub(crate) fn new(signal: Signal) -> Self { Self(signal) }

    /// Wait until the session has stopped.
    pub async fn wait(&self) { self.0.fired().await; }

    /// Whether the session has already stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.0.is_fired() }
}
