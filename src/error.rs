//! Error types for socket manager operations.
//!
//! [`SocketError`] is the single error surface returned to applications.
//! Inbound decoding failures use [`DecodeError`]; they are logged by the
//! dispatcher and never reach callers.

use std::time::Duration;

use crate::transport::TransportError;

/// Errors returned by [`SocketManager`](crate::SocketManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// The manager was configured with invalid arguments.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    /// The Nym client could not be reached, or dropped the connection while
    /// the session was being established.
    #[error("failed to open connection to {address} ({source}). Is the websocket up and running?")]
    Connection {
        /// Target address.
        address: String,
        /// Transport diagnostic.
        #[source]
        source: TransportError,
    },
    /// The Nym client did not answer the identity request in time.
    #[error("no identity reply from {address} within {timeout:?}")]
    HandshakeTimeout {
        /// Target address.
        address: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// No connection is open.
    #[error("connection is undefined. Is the socket manager started?")]
    NotStarted,
    /// An outbound message could not be serialized.
    #[error("failed to encode {kind} request")]
    Encoding {
        /// Discriminator of the rejected request.
        kind: &'static str,
        /// Serializer diagnostic.
        #[source]
        source: EncodeError,
    },
    /// Writing to the transport failed.
    #[error("failed to write {what}: {source}")]
    Write {
        /// What was being written.
        what: &'static str,
        /// Transport diagnostic.
        #[source]
        source: TransportError,
    },
}

/// Invalid manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No target address was supplied.
    #[error("connection URI cannot be empty")]
    EmptyAddress,
    /// No message handler was registered.
    #[error("message handler needs to be defined")]
    MissingHandler,
    /// A handshake or shutdown timeout of zero was configured.
    #[error("{name} timeout must be greater than zero")]
    ZeroTimeout {
        /// Which timeout was zero.
        name: &'static str,
    },
}

/// Failure to serialize an outbound request.
#[derive(Debug, thiserror::Error)]
#[error("failed to serialize request: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Failure to interpret an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The frame is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// The frame has no string `"type"` attribute.
    #[error("message has no \"type\" attribute")]
    MissingType,
    /// The frame's fields do not match its discriminator.
    #[error("failed to decode {kind} message: {source}")]
    Variant {
        /// Discriminator of the frame.
        kind: &'static str,
        /// Deserializer diagnostic.
        #[source]
        source: serde_json::Error,
    },
}
