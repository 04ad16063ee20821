//! Serialized write path to the Nym client.
//!
//! Every write, whether an application message, a handler reply, or the
//! close frame sent during teardown, goes through one async lock around the
//! transport's write half. Two writes therefore never interleave on the wire,
//! and a write in progress never blocks inspection of the manager's state,
//! which lives behind a different lock.
//!
//! Each attached write half comes with a release signal. Teardown fires it
//! before detaching, so a writer stalled on a peer that stopped reading, or
//! queued behind one, gives up and frees the lock.

use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use futures::SinkExt;
use tokio::sync::Mutex;
use tracing::{Instrument, Span, debug, warn};

use crate::{
    codec,
    error::SocketError,
    message::ClientRequest,
    signal::Signal,
    metrics::{self, Direction},
    tracing_config::TracingConfig,
    tracing_helpers::{emit_timing_event, send_span, start_timer},
    transport::{Frame, FrameSink, TransportError},
};

#[derive(Clone)]
pub(crate) struct SendPath {
    inner: Arc<SendInner>,
}

struct SendInner {
    sink: Mutex<Option<FrameSink>>,
    released: StdMutex<Signal>,
    tracing: TracingConfig,
    span: Span,
}

impl SendPath {
    pub(crate) fn new(tracing: TracingConfig, span: Span) -> Self {
        Self {
            inner: Arc::new(SendInner {
                sink: Mutex::new(None),
                released: StdMutex::new(Signal::new()),
                tracing,
                span,
            }),
        }
    }

    fn release_signal(&self) -> Signal {
        self.inner
            .released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install the write half of a freshly opened transport.
    pub(crate) async fn attach(&self, sink: FrameSink) {
        let mut guard = self.inner.sink.lock().await;
        *self
            .inner
            .released
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Signal::new();
        *guard = Some(sink);
    }

    /// Abort every write in progress or waiting for the lock.
    ///
    /// Aborted writes fail with [`SocketError::Write`]. Writes started after
    /// the next [`attach`](Self::attach) are unaffected.
    pub(crate) fn release(&self) { self.release_signal().fire(); }

    /// Remove the write half so it can be closed. Later sends fail with
    /// [`SocketError::NotStarted`].
    pub(crate) async fn detach(&self) -> Option<FrameSink> { self.inner.sink.lock().await.take() }

    /// Run `write` unless the current write half is released first.
    async fn guarded<F>(&self, what: &'static str, write: F) -> Result<(), SocketError>
    where
        F: Future<Output = Result<(), SocketError>>,
    {
        let released = self.release_signal();
        tokio::select! {
            biased;
            result = write => result,
            () = released.fired() => Err(SocketError::Write {
                what,
                source: TransportError::Closed,
            }),
        }
    }

    /// Encode and write `request`.
    pub(crate) async fn send(&self, request: &ClientRequest) -> Result<(), SocketError> {
        let span = send_span(&self.inner.tracing, &self.inner.span, request.kind());
        let timer = start_timer(self.inner.tracing.send_timing);
        async {
            let result = self.guarded("message", self.write_request(request)).await;
            if let Err(err) = &result {
                warn!(error = %err, "send failed");
            }
            emit_timing_event(timer);
            result
        }
        .instrument(span)
        .await
    }

    /// Write a protocol-level close frame.
    pub(crate) async fn send_close(&self) -> Result<(), SocketError> {
        self.guarded("close frame", self.write_close()).await
    }

    async fn write_close(&self) -> Result<(), SocketError> {
        let mut guard = self.inner.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(SocketError::NotStarted);
        };
        sink.send(Frame::Close)
            .await
            .map_err(|source| SocketError::Write {
                what: "close frame",
                source,
            })?;
        debug!("sent websocket close message");
        Ok(())
    }

    async fn write_request(&self, request: &ClientRequest) -> Result<(), SocketError> {
        let mut guard = self.inner.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(SocketError::NotStarted);
        };
        let text = codec::encode(request).map_err(|source| SocketError::Encoding {
            kind: request.kind(),
            source,
        })?;
        Span::current().record("frame.bytes", text.len());
        sink.send(Frame::Text(text))
            .await
            .map_err(|source| SocketError::Write {
                what: "message",
                source,
            })?;
        metrics::inc_frames(Direction::Outbound);
        Ok(())
    }
}

/// Sends requests on the connection a message arrived on.
///
/// Handed to every [`MessageHandler`](crate::hooks::MessageHandler)
/// invocation. Cheap to clone; clones share the manager's write lock, so
/// replies never interleave with other writes.
#[derive(Clone)]
pub struct Replier {
    path: SendPath,
}

impl Replier {
    pub(crate) fn new(path: SendPath) -> Self { Self { path } }

    /// Send `request` to the Nym client.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotStarted`] once the connection has been torn
    /// down, [`SocketError::Encoding`] if the request cannot be serialized, or
    /// [`SocketError::Write`] if the transport rejects the frame.
    pub async fn send(&self, request: &ClientRequest) -> Result<(), SocketError> {
        self.path.send(request).await
    }
}

impl fmt::Debug for Replier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replier").finish_non_exhaustive()
    }
}
