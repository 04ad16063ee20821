//! Builder for [`SocketManager`].

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::Span;

use super::{Inner, SocketManager, State};
use crate::{
    config::SocketConfig,
    error::{SocketError, ValidationError},
    hooks::{MessageHandler, message_handler},
    message::ReceivedMessage,
    sender::{Replier, SendPath},
    session::SharedSession,
    tracing_config::TracingConfig,
    transport::{Connector, WebSocketConnector},
};

/// Configures a [`SocketManager`].
///
/// Only the target address and a message handler are required. The builder
/// dials with [`WebSocketConnector`] unless another [`Connector`] is
/// supplied.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use nym_socket::SocketManager;
///
/// let manager = SocketManager::builder("ws://127.0.0.1:1977")
///     .identity_timeout(Duration::from_secs(2))
///     .on_message(|_message, _replier| async {})
///     .build()
///     .expect("valid configuration");
/// assert_eq!(manager.address(), "ws://127.0.0.1:1977");
/// ```
pub struct SocketManagerBuilder {
    config: SocketConfig,
    handler: Option<MessageHandler>,
    connector: Option<Arc<dyn Connector>>,
    span: Option<Span>,
    tracing: TracingConfig,
}

impl SocketManagerBuilder {
    /// Create a builder targeting `address` with default settings.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            config: SocketConfig::new(address),
            handler: None,
            connector: None,
            span: None,
            tracing: TracingConfig::default(),
        }
    }

    /// Replace the address and timeouts wholesale.
    #[must_use]
    pub fn config(mut self, config: SocketConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound the wait for the identity reply during `start`.
    #[must_use]
    pub fn identity_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.identity_timeout(timeout);
        self
    }

    /// Bound the wait for the close acknowledgement during `stop`.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.close_timeout(timeout);
        self
    }

    /// Register an async closure invoked for each application message.
    #[must_use]
    pub fn on_message<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ReceivedMessage, Replier) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handler = Some(message_handler(f));
        self
    }

    /// Register a prebuilt [`MessageHandler`].
    #[must_use]
    pub fn message_handler(mut self, handler: MessageHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Dial through `connector` instead of the websocket default.
    #[must_use]
    pub fn connector<C: Connector>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Parent span for everything the manager logs.
    ///
    /// Defaults to an `INFO` span named `socket_manager`.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Configure span levels and timing for manager operations.
    #[must_use]
    pub fn tracing_config(mut self, config: TracingConfig) -> Self {
        self.tracing = config;
        self
    }

    /// Validate the configuration and create the manager.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::Validation`] if the address is empty, a
    /// timeout is zero, or no message handler was registered.
    pub fn build(self) -> Result<SocketManager, SocketError> {
        self.config.validate()?;
        let handler = self.handler.ok_or(ValidationError::MissingHandler)?;
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("socket_manager", component = "NymSocketManager"));
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector));
        let sender = SendPath::new(self.tracing.clone(), span.clone());
        Ok(SocketManager {
            inner: Arc::new(Inner {
                config: self.config,
                connector,
                handler,
                tracing: self.tracing,
                span,
                state: Mutex::new(State::default()),
                shared: Arc::new(SharedSession::default()),
                sender,
            }),
        })
    }
}
