//! Connection lifecycle manager for a local Nym client.
//!
//! A [`SocketManager`] owns at most one websocket session at a time. `start`
//! dials the Nym client, performs the identity handshake and hands back a
//! [`StoppedSignal`](crate::signal::StoppedSignal); `stop`, or the peer
//! closing the connection, runs the close handshake and releases the
//! transport. Inbound application messages are delivered to the registered
//! [`MessageHandler`] while the session is open.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Span;

use crate::{
    config::SocketConfig,
    error::SocketError,
    hooks::MessageHandler,
    listener::ListenerHandle,
    message::ClientRequest,
    sender::{Replier, SendPath},
    session::{Phase, SharedSession},
    signal::Signal,
    tracing_config::TracingConfig,
    transport::Connector,
};

mod builder;
mod lifecycle;
#[cfg(test)]
mod tests;

pub use builder::SocketManagerBuilder;

/// Manages the websocket session with a Nym client.
///
/// Clones share the same session.
///
/// # Examples
///
/// ```no_run
/// use nym_socket::{ClientRequest, SocketManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), nym_socket::SocketError> {
/// let manager = SocketManager::builder("ws://127.0.0.1:1977")
///     .on_message(|message, _replier| async move {
///         println!("got {}", message.message);
///     })
///     .build()?;
///
/// if let Some(stopped) = manager.start().await? {
///     println!("our address is {}", manager.identity());
///     manager
///         .send(&ClientRequest::send(manager.identity(), "hello"))
///         .await?;
///     manager.stop().await;
///     stopped.wait().await;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SocketManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SocketConfig,
    connector: Arc<dyn Connector>,
    handler: MessageHandler,
    tracing: TracingConfig,
    span: Span,
    state: Mutex<State>,
    shared: Arc<SharedSession>,
    sender: SendPath,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    next_generation: u64,
}

/// An open transport and the receive loop reading from it.
struct Session {
    generation: u64,
    listener: ListenerHandle,
    stopped: Option<Signal>,
}

impl SocketManager {
    /// Start configuring a manager for the Nym client at `address`.
    #[must_use]
    pub fn builder(address: impl Into<String>) -> SocketManagerBuilder {
        SocketManagerBuilder::new(address)
    }

    /// Whether a session is open.
    ///
    /// Waits for any `start` or `stop` in progress to finish.
    pub async fn is_running(&self) -> bool { self.inner.state.lock().await.session.is_some() }

    /// Address the Nym client assigned to this connection.
    ///
    /// Empty until the first identity reply arrives.
    #[must_use]
    pub fn identity(&self) -> String { self.inner.shared.identity() }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase { self.inner.shared.phase() }

    /// Target websocket address.
    #[must_use]
    pub fn address(&self) -> &str { self.inner.config.address_value() }

    /// Send `request` to the Nym client.
    ///
    /// Writes are serialized with handler replies and the close frame, so
    /// concurrent calls never interleave on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotStarted`] when no session is open,
    /// [`SocketError::Encoding`] if the request cannot be serialized, or
    /// [`SocketError::Write`] if the transport rejects the frame.
    pub async fn send(&self, request: &ClientRequest) -> Result<(), SocketError> {
        self.inner.sender.send(request).await
    }

    /// A handle that sends on this manager's connection.
    #[must_use]
    pub fn replier(&self) -> Replier { Replier::new(self.inner.sender.clone()) }
}

impl std::fmt::Debug for SocketManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketManager")
            .field("address", &self.inner.config.address_value())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
