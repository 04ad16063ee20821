//! `nym-socket` binary.
//!
//! Connects to a local Nym client, prints the assigned address, optionally
//! sends one message, and logs everything the mixnet delivers until Ctrl+C
//! or the client closes the connection.

mod cli;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use nym_socket::{ClientRequest, SocketError, SocketManager};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "nym-socket failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: cli::Cli) -> Result<(), SocketError> {
    let manager = SocketManager::builder(cli.address)
        .identity_timeout(Duration::from_secs(cli.identity_timeout))
        .on_message(|message, _replier| async move {
            info!(
                message = %message.message,
                sender_tag = ?message.sender_tag,
                "received message"
            );
        })
        .build()?;

    let Some(stopped) = manager.start().await? else {
        return Ok(());
    };
    println!("{}", manager.identity());

    if let (Some(recipient), Some(message)) = (cli.recipient, cli.message) {
        let request = if cli.reply_surb {
            ClientRequest::send_with_reply_surb(recipient, message)
        } else {
            ClientRequest::send(recipient, message)
        };
        manager.send(&request).await?;
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "failed to listen for Ctrl+C");
            }
            manager.stop().await;
        }
        () = stopped.wait() => info!("connection closed by the Nym client"),
    }
    Ok(())
}
