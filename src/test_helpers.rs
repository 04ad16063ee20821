#![cfg(any(test, feature = "test-helpers"))]
//! In-memory transport for exercising the manager without sockets.
//!
//! [`MemoryConnector`] hands out channel-backed transports whose far end is a
//! scripted [`MemoryPeer`] that plays the Nym client: it answers identity
//! requests, acknowledges close frames, and records every frame it receives.
//! Tests can inject arbitrary frames through the peer handle.

use std::{
    io,
    pin::Pin,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    Sink,
    SinkExt,
    StreamExt,
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use serde_json::Value;

use crate::{
    hooks::{MessageHandler, message_handler},
    message::{ReceivedMessage, kind},
    signal::Signal,
    transport::{Connector, Frame, Transport, TransportError},
};

/// Identity the scripted peer assigns by default.
pub const DEFAULT_IDENTITY: &str = "client.test@gateway.test";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a scripted peer behaves.
#[derive(Clone, Debug)]
pub struct PeerScript {
    identity: Option<String>,
    acknowledge_close: bool,
    hang_up_on_accept: bool,
    stall_writes_after: Option<usize>,
}

impl Default for PeerScript {
    fn default() -> Self {
        Self {
            identity: Some(DEFAULT_IDENTITY.to_owned()),
            acknowledge_close: true,
            hang_up_on_accept: false,
            stall_writes_after: None,
        }
    }
}

impl PeerScript {
    /// Answer identity requests with `identity`.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Never answer identity requests.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.identity = None;
        self
    }

    /// Ignore close frames instead of answering and hanging up.
    #[must_use]
    pub fn ignore_close(mut self) -> Self {
        self.acknowledge_close = false;
        self
    }

    /// Accept `frames` writes from the client, then stop reading so every
    /// later write and the final close never complete.
    #[must_use]
    pub fn stall_writes_after(mut self, frames: usize) -> Self {
        self.stall_writes_after = Some(frames);
        self
    }

    /// Drop both directions as soon as the connection is accepted.
    #[must_use]
    pub fn hang_up_on_accept(mut self) -> Self {
        self.hang_up_on_accept = true;
        self
    }
}

/// Connector producing in-memory transports to scripted peers.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<ConnectorInner>,
}

#[derive(Default)]
struct ConnectorInner {
    script: Mutex<PeerScript>,
    peers: Mutex<Vec<MemoryPeer>>,
    refuse: AtomicBool,
    dials: AtomicUsize,
}

impl MemoryConnector {
    /// Create a connector whose peers follow `script`.
    #[must_use]
    pub fn new(script: PeerScript) -> Self {
        let connector = Self::default();
        *lock(&connector.inner.script) = script;
        connector
    }

    /// Refuse (or accept again) subsequent connection attempts.
    pub fn refuse_connections(&self, refuse: bool) { self.inner.refuse.store(refuse, Ordering::SeqCst); }

    /// Replace the script used for subsequent connections.
    pub fn set_script(&self, script: PeerScript) { *lock(&self.inner.script) = script; }

    /// Number of connection attempts, refused ones included.
    #[must_use]
    pub fn dials(&self) -> usize { self.inner.dials.load(Ordering::SeqCst) }

    /// Peers of every accepted connection, oldest first.
    #[must_use]
    pub fn peers(&self) -> Vec<MemoryPeer> { lock(&self.inner.peers).clone() }

    /// Peer of the most recent accepted connection.
    #[must_use]
    pub fn last_peer(&self) -> Option<MemoryPeer> { lock(&self.inner.peers).last().cloned() }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, address: &str) -> Result<Transport, TransportError> {
        self.inner.dials.fetch_add(1, Ordering::SeqCst);
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection to {address} refused"),
            )));
        }

        let (to_peer, from_client) = mpsc::unbounded::<Frame>();
        let (to_client, from_peer) = mpsc::unbounded::<Result<Frame, TransportError>>();
        let peer = MemoryPeer::new(to_client);
        let script = lock(&self.inner.script).clone();
        let stall_after = script.stall_writes_after;
        tokio::spawn(run_script(script, peer.clone(), from_client));
        lock(&self.inner.peers).push(peer);

        Ok(match stall_after {
            Some(frames) => Transport::new(StallingSink::new(to_peer, frames), from_peer),
            None => Transport::new(to_peer.sink_map_err(|_| TransportError::Closed), from_peer),
        })
    }
}

/// Write half that accepts a fixed number of frames and then never becomes
/// ready again, like a socket whose peer has stopped reading.
pub struct StallingSink {
    inner: UnboundedSender<Frame>,
    remaining: usize,
}

impl StallingSink {
    /// Forward the first `frames` writes to `inner`, then stall.
    #[must_use]
    pub fn new(inner: UnboundedSender<Frame>, frames: usize) -> Self {
        Self {
            inner,
            remaining: frames,
        }
    }
}

impl Sink<Frame> for StallingSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Pending;
        }
        Pin::new(&mut this.inner)
            .poll_ready(cx)
            .map_err(|_| TransportError::Closed)
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.get_mut();
        this.remaining = this.remaining.saturating_sub(1);
        Pin::new(&mut this.inner)
            .start_send(item)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_flush(cx)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Pending;
        }
        Pin::new(&mut this.inner)
            .poll_close(cx)
            .map_err(|_| TransportError::Closed)
    }
}

/// Far end of an in-memory transport.
#[derive(Clone)]
pub struct MemoryPeer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    to_client: Mutex<Option<UnboundedSender<Result<Frame, TransportError>>>>,
    received: Mutex<Vec<Frame>>,
    client_closed: Signal,
}

impl MemoryPeer {
    fn new(to_client: UnboundedSender<Result<Frame, TransportError>>) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                to_client: Mutex::new(Some(to_client)),
                received: Mutex::new(Vec::new()),
                client_closed: Signal::new(),
            }),
        }
    }

    fn deliver(&self, item: Result<Frame, TransportError>) -> bool {
        lock(&self.inner.to_client)
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(item).is_ok())
    }

    /// Send `frame` to the client. Returns `false` once the peer has hung up.
    pub fn push(&self, frame: Frame) -> bool { self.deliver(Ok(frame)) }

    /// Send a text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) -> bool { self.push(Frame::Text(text.into())) }

    /// Make the client's next read fail with `error`.
    pub fn push_error(&self, error: TransportError) -> bool { self.deliver(Err(error)) }

    /// End the client's read stream.
    pub fn hang_up(&self) { lock(&self.inner.to_client).take(); }

    /// Every frame the client has written, in order.
    #[must_use]
    pub fn received(&self) -> Vec<Frame> { lock(&self.inner.received).clone() }

    /// Text frames the client has written, parsed as JSON.
    #[must_use]
    pub fn received_requests(&self) -> Vec<Value> {
        self.received()
            .iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str(text).ok(),
                _ => None,
            })
            .collect()
    }

    /// Fires once the client's write half is closed or dropped.
    #[must_use]
    pub fn client_closed(&self) -> &Signal { &self.inner.client_closed }
}

fn is_self_address_request(frame: &Frame) -> bool {
    let Frame::Text(text) = frame else {
        return false;
    };
    serde_json::from_str::<Value>(text)
        .is_ok_and(|value| value.get("type").and_then(Value::as_str) == Some(kind::SELF_ADDRESS))
}

async fn run_script(script: PeerScript, peer: MemoryPeer, mut from_client: UnboundedReceiver<Frame>) {
    if script.hang_up_on_accept {
        peer.hang_up();
        drop(from_client);
        peer.inner.client_closed.fire();
        return;
    }

    while let Some(frame) = from_client.next().await {
        lock(&peer.inner.received).push(frame.clone());
        if frame == Frame::Close {
            if script.acknowledge_close {
                peer.push(Frame::Close);
                peer.hang_up();
            }
        } else if let Some(identity) = &script.identity
            && is_self_address_request(&frame)
        {
            let reply = serde_json::json!({"type": kind::SELF_ADDRESS, "address": identity});
            peer.push_text(reply.to_string());
        }
    }
    peer.inner.client_closed.fire();
}

/// Collects every message passed to its handler.
#[derive(Clone, Default)]
pub struct Inbox {
    messages: Arc<Mutex<Vec<ReceivedMessage>>>,
}

impl Inbox {
    /// A handler that appends each message to this inbox.
    #[must_use]
    pub fn handler(&self) -> MessageHandler {
        let messages = Arc::clone(&self.messages);
        message_handler(move |message, _replier| {
            let messages = Arc::clone(&messages);
            async move {
                lock(&messages).push(message);
            }
        })
    }

    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<ReceivedMessage> { lock(&self.messages).clone() }
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually<F: Fn() -> bool>(limit: Duration, condition: F) -> bool {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(limit, poll).await.is_ok()
}
