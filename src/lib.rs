#![doc(html_root_url = "https://docs.rs/nym-socket/latest")]
//! Connection lifecycle management for a local Nym client websocket.
//!
//! The crate opens a websocket to a Nym native client, learns the mixnet
//! address assigned to the connection, delivers inbound messages to an
//! application handler and sends requests back into the mixnet. Shutdown
//! follows a close handshake with a bounded wait, whether the application or
//! the peer initiates it.

pub mod codec;
pub mod config;
mod dispatcher;
pub mod error;
pub mod hooks;
mod listener;
pub mod manager;
pub mod message;
pub mod metrics;
mod sender;
pub mod session;
pub mod signal;
pub mod test_helpers;
pub mod tracing_config;
mod tracing_helpers;
pub mod transport;

pub use config::SocketConfig;
pub use error::{DecodeError, EncodeError, SocketError, ValidationError};
pub use hooks::MessageHandler;
pub use manager::{SocketManager, SocketManagerBuilder};
pub use message::{ClientRequest, ReceivedMessage, ServerResponse};
pub use sender::Replier;
pub use session::Phase;
pub use signal::StoppedSignal;
pub use tracing_config::TracingConfig;
