//! Start, stop and teardown.
//!
//! Every transition runs under the state lock. Teardown takes the already
//! held guard and never locks on its own, so a failed `start`, an explicit
//! `stop` and a peer-initiated closure all share one release sequence.

use std::sync::Arc;

use futures::SinkExt;
use tracing::{Instrument, debug, info, warn};

use super::{Inner, Session, SocketManager, State};
use crate::{
    dispatcher::Dispatcher,
    error::SocketError,
    listener::spawn_listener,
    message::ClientRequest,
    metrics,
    sender::Replier,
    session::Phase,
    signal::{Signal, StoppedSignal},
    tracing_helpers::{emit_timing_event, start_span, start_timer, stop_span},
    transport::TransportError,
};

impl SocketManager {
    /// Open a session with the Nym client.
    ///
    /// Dials the configured address, requests this connection's identity and
    /// waits for the reply. On success the returned [`StoppedSignal`] fires
    /// once the session has been torn down. When a session is already open
    /// the call logs a warning and returns `Ok(None)` without dialling again.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::Connection`] if the Nym client cannot be
    /// reached or drops the connection during the handshake, and
    /// [`SocketError::HandshakeTimeout`] if the identity request cannot be
    /// written and answered within the identity timeout. The transport is
    /// released before either error is returned, so a failed start takes at
    /// most the identity timeout plus two close timeouts.
    pub async fn start(&self) -> Result<Option<StoppedSignal>, SocketError> {
        let inner = &self.inner;
        let span = start_span(&inner.tracing, &inner.span, inner.config.address_value());
        let timer = start_timer(inner.tracing.start_timing);
        async {
            let mut state = inner.state.lock().await;
            if state.session.is_some() {
                warn!("socket manager already started");
                return Ok(None);
            }
            let result = self.open_session(&mut state).await;
            inner.shared.clear_identity_waiter();
            match result {
                Ok(stopped) => {
                    info!(identity = %inner.shared.identity(), "socket manager started");
                    emit_timing_event(timer);
                    Ok(Some(stopped))
                }
                Err(err) => {
                    warn!(error = %err, "failed to start socket manager");
                    teardown(inner, &mut state).await;
                    inner.shared.set_phase(Phase::Idle);
                    emit_timing_event(timer);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Close the session, if one is open.
    ///
    /// Sends a close frame and waits for the peer to acknowledge it, then
    /// closes the write half and fires the session's [`StoppedSignal`].
    /// Writing the close frame and waiting for the acknowledgement share one
    /// close timeout; closing the write half gets another, so `stop` returns
    /// within two close timeouts even when the peer stops reading. Failures
    /// along the way are logged.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let span = stop_span(&inner.tracing, &inner.span);
        let timer = start_timer(inner.tracing.stop_timing);
        async {
            let mut state = inner.state.lock().await;
            if state.session.is_none() {
                debug!("socket manager not running");
                return;
            }
            teardown(inner, &mut state).await;
            emit_timing_event(timer);
        }
        .instrument(span)
        .await;
    }

    /// Tear down session `generation` after its receive loop ended.
    pub(super) async fn stop_session(&self, generation: u64) {
        let mut state = self.inner.state.lock().await;
        match &state.session {
            Some(session) if session.generation == generation => {
                info!("connection closed by peer");
                teardown(&self.inner, &mut state).await;
            }
            _ => debug!(generation, "ignoring stop request for finished session"),
        }
    }

    async fn open_session(&self, state: &mut State) -> Result<StoppedSignal, SocketError> {
        let inner = &self.inner;
        let address = inner.config.address_value();

        inner.shared.set_phase(Phase::Connecting);
        let transport = inner
            .connector
            .connect(address)
            .await
            .map_err(|source| connection_error(address, source))?;
        debug!("connection established");

        let (sink, stream) = transport.into_parts();
        inner.sender.attach(sink).await;
        let identity = inner.shared.expect_identity();

        let generation = state.next_generation;
        state.next_generation += 1;
        let dispatcher = Dispatcher::new(
            Arc::clone(&inner.shared),
            Arc::clone(&inner.handler),
            Replier::new(inner.sender.clone()),
        );
        let listener = spawn_listener(
            stream,
            dispatcher,
            self.stop_on_session_end(generation),
            tracing::debug_span!(parent: &inner.span, "socket.receive", session.generation = generation),
        );
        let closed = listener.closed().clone();
        state.session = Some(Session {
            generation,
            listener,
            stopped: None,
        });
        metrics::inc_sessions();

        inner.shared.set_phase(Phase::AwaitingIdentity);
        let identity_timeout = inner.config.identity_timeout_value();
        let handshake = async {
            match inner.sender.send(&ClientRequest::SelfAddress).await {
                Ok(()) => await_identity(&identity, &closed, address).await,
                Err(SocketError::Write { source, .. }) => Err(connection_error(address, source)),
                Err(other) => Err(other),
            }
        };
        tokio::time::timeout(identity_timeout, handshake)
            .await
            .map_err(|_| SocketError::HandshakeTimeout {
                address: address.to_owned(),
                timeout: identity_timeout,
            })??;

        let stopped = Signal::new();
        if let Some(session) = state.session.as_mut() {
            session.stopped = Some(stopped.clone());
        }
        inner.shared.set_phase(Phase::Ready);
        Ok(StoppedSignal::new(stopped))
    }

    /// Callback run by the receive loop when the peer ends the session.
    ///
    /// Holds the manager weakly so a dropped manager is not kept alive by
    /// its own receive loop.
    fn stop_on_session_end(&self, generation: u64) -> impl FnOnce() + Send + 'static {
        let inner = Arc::downgrade(&self.inner);
        move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let manager = SocketManager { inner };
            tokio::spawn(async move { manager.stop_session(generation).await });
        }
    }
}

fn connection_error(address: &str, source: TransportError) -> SocketError {
    SocketError::Connection {
        address: address.to_owned(),
        source,
    }
}

/// Wait for the identity reply, failing early if the peer goes away.
async fn await_identity(identity: &Signal, closed: &Signal, address: &str) -> Result<(), SocketError> {
    tokio::select! {
        biased;
        () = identity.fired() => Ok(()),
        () = closed.fired() => Err(connection_error(address, TransportError::Closed)),
    }
}

/// Release the open session. The caller holds the state lock.
async fn teardown(inner: &Inner, state: &mut State) {
    let Some(session) = state.session.take() else {
        return;
    };
    inner.shared.set_phase(Phase::Closing);
    let close_timeout = inner.config.close_timeout_value();

    // The close frame write and its acknowledgement share one deadline.
    let acknowledged = tokio::time::timeout(close_timeout, async {
        if let Err(err) = inner.sender.send_close().await {
            warn!(error = %err, "failed to send close message");
        }
        session.listener.closed().fired().await;
    })
    .await;
    if acknowledged.is_err() {
        warn!(timeout = ?close_timeout, "timed out waiting for connection to close");
    }
    session.listener.cancel();

    // Abort writers stuck on the old connection before taking the send lock.
    inner.sender.release();
    let closed = tokio::time::timeout(close_timeout, async {
        match inner.sender.detach().await {
            Some(mut sink) => sink.close().await,
            None => Ok(()),
        }
    })
    .await;
    match closed {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "failed to close connection"),
        Err(_) => warn!(timeout = ?close_timeout, "timed out closing connection"),
    }

    if let Some(stopped) = session.stopped {
        stopped.fire();
    }
    metrics::dec_sessions();
    inner.shared.set_phase(Phase::Idle);
    info!(generation = session.generation, "socket manager stopped");
}
