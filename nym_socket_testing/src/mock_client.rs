//! Websocket server imitating a local Nym client.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Identity assigned when [`Behaviour::identity`] is left at its default.
pub const DEFAULT_IDENTITY: &str = "mock.client@mock.gateway";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the mock client responds.
#[derive(Clone, Debug)]
pub struct Behaviour {
    /// Identity returned for `selfAddress` requests; `None` never answers.
    pub identity: Option<String>,
    /// Answer a close frame with a close frame.
    pub acknowledge_close: bool,
    /// Deliver `send` requests addressed to our own identity back as
    /// `received` frames.
    pub loopback: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            identity: Some(DEFAULT_IDENTITY.to_owned()),
            acknowledge_close: true,
            loopback: true,
        }
    }
}

enum Command {
    Push(String),
    HangUp,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<Value>>,
    connections: AtomicUsize,
    current: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

/// A mock Nym client listening on localhost.
///
/// The server task is aborted when the handle is dropped.
pub struct MockNymClient {
    address: String,
    shared: Arc<Shared>,
    server: JoinHandle<()>,
}

impl MockNymClient {
    /// Bind an ephemeral port and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn(behaviour: Behaviour) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)).await?;
        let address = format!("ws://{}", listener.local_addr()?);
        let shared = Arc::new(Shared::default());
        let server = tokio::spawn(serve(listener, behaviour, Arc::clone(&shared)));
        Ok(Self {
            address,
            shared,
            server,
        })
    }

    /// Websocket URL to dial.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn connections(&self) -> usize { self.shared.connections.load(Ordering::SeqCst) }

    /// Every JSON request received, across all connections.
    #[must_use]
    pub fn received(&self) -> Vec<Value> { lock(&self.shared.received).clone() }

    /// Send `frame` as a text message on the latest connection.
    pub fn push(&self, frame: &Value) -> bool { self.command(Command::Push(frame.to_string())) }

    /// Drop the latest connection without a close handshake.
    pub fn hang_up(&self) -> bool { self.command(Command::HangUp) }

    fn command(&self, command: Command) -> bool {
        lock(&self.shared.current)
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }
}

impl Drop for MockNymClient {
    fn drop(&mut self) { self.server.abort(); }
}

async fn serve(listener: TcpListener, behaviour: Behaviour, shared: Arc<Shared>) {
    // Dropping the set when the server task is aborted ends every connection.
    let mut connections = JoinSet::new();
    while let Ok((stream, _)) = listener.accept().await {
        shared.connections.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&shared.current) = Some(tx);
        connections.spawn(handle(stream, behaviour.clone(), Arc::clone(&shared), rx));
    }
}

async fn handle(
    stream: TcpStream,
    behaviour: Behaviour,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let Ok(socket) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut stream) = socket.split();
    let mut tags = 0_usize;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Push(text)) => {
                    if sink.send(Message::text(text)).await.is_err() {
                        return;
                    }
                }
                Some(Command::HangUp) | None => return,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    let replies = respond(&behaviour, &request, &mut tags);
                    lock(&shared.received).push(request);
                    for reply in replies {
                        if sink.send(Message::text(reply.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    if !behaviour.acknowledge_close {
                        // Keep the socket open but never flush the pending
                        // close reply.
                        std::future::pending::<()>().await;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            },
        }
    }
}

fn respond(behaviour: &Behaviour, request: &Value, tags: &mut usize) -> Vec<Value> {
    let Some(identity) = behaviour.identity.as_deref() else {
        return Vec::new();
    };
    match request.get("type").and_then(Value::as_str) {
        Some("selfAddress") => vec![json!({"type": "selfAddress", "address": identity})],
        Some("send")
            if behaviour.loopback
                && request.get("recipient").and_then(Value::as_str) == Some(identity) =>
        {
            let mut received = json!({"type": "received", "message": request["message"]});
            if request.get("withReplySurb").and_then(Value::as_bool) == Some(true) {
                *tags += 1;
                received["senderTag"] = json!(format!("tag-{tags}"));
            }
            vec![received]
        }
        Some("reply") if behaviour.loopback => {
            vec![json!({"type": "received", "message": request["message"]})]
        }
        _ => Vec::new(),
    }
}
