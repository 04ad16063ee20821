//! Transport seam between the manager and the network.
//!
//! A [`Connector`] dials an address and yields a [`Transport`]: a frame sink
//! for writes and a frame stream for reads. The manager hands the sink to the
//! send path and the stream to the receive loop, so the two halves are never
//! contended. [`WebSocketConnector`] is the production implementation.

use std::{io, pin::Pin, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, Stream};

mod websocket;

pub use websocket::WebSocketConnector;

/// A single transport frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text data.
    Text(String),
    /// Binary data.
    Binary(Bytes),
    /// Protocol-level close request.
    Close,
}

impl Frame {
    /// Payload bytes of a data frame, or `None` for a close frame.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Binary(bytes) => Some(bytes),
            Self::Close => None,
        }
    }
}

/// Errors raised by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Websocket protocol or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// I/O failure outside the websocket layer.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// The other side has gone away.
    #[error("transport closed")]
    Closed,
}

/// Write half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Read half of a transport.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// An open duplex connection.
pub struct Transport {
    sink: FrameSink,
    stream: FrameStream,
}

impl Transport {
    /// Wrap a sink and stream pair.
    pub fn new<Si, St>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Frame, Error = TransportError> + Send + 'static,
        St: Stream<Item = Result<Frame, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// Split into the write and read halves.
    #[must_use]
    pub fn into_parts(self) -> (FrameSink, FrameStream) { (self.sink, self.stream) }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Dials a Nym client endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the endpoint cannot be reached.
    async fn connect(&self, address: &str) -> Result<Transport, TransportError>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    async fn connect(&self, address: &str) -> Result<Transport, TransportError> {
        (**self).connect(address).await
    }
}
