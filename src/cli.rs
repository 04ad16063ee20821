//! Command line interface for the `nym-socket` binary.
//!
//! Also compiled by the build script to render the man page, so this file
//! depends on nothing but `clap`.

use clap::Parser;

/// Command line arguments for the `nym-socket` binary.
#[derive(Debug, Parser)]
#[command(
    name = "nym-socket",
    version,
    about = "Connect to a local Nym client and print the messages it delivers"
)]
pub struct Cli {
    /// Websocket address of the Nym client.
    #[arg(short, long, env = "NYM_CLIENT_URI", default_value = "ws://127.0.0.1:1977")]
    pub address: String,

    /// Seconds to wait for the identity reply.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub identity_timeout: u64,

    /// Send `--message` to this Nym address once connected.
    #[arg(short, long, requires = "message")]
    pub recipient: Option<String>,

    /// Message body for `--recipient`.
    #[arg(short, long, requires = "recipient")]
    pub message: Option<String>,

    /// Attach reply blocks so the recipient can answer anonymously.
    #[arg(long, requires = "recipient")]
    pub reply_surb: bool,
}
