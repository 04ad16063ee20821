//! Utilities for exercising `nym-socket` against a real websocket.
//!
//! [`MockNymClient`] listens on an ephemeral localhost port and speaks the
//! Nym client websocket API: it assigns an identity, optionally loops
//! messages sent to that identity back as `received` frames, and answers
//! close handshakes. The [`metrics`] module wraps a debugging recorder for
//! asserting on the crate's counters.
//!
//! ```rust,no_run
//! use nym_socket_testing::{Behaviour, MockNymClient};
//!
//! # async fn example() -> std::io::Result<()> {
//! let client = MockNymClient::spawn(Behaviour::default()).await?;
//! println!("dial {}", client.address());
//! # Ok(())
//! # }
//! ```

pub mod metrics;
pub mod mock_client;

pub use mock_client::{Behaviour, DEFAULT_IDENTITY, MockNymClient};
