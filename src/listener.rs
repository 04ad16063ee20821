//! Receive loop feeding inbound frames to the dispatcher.
//!
//! The loop owns the transport's read half. It runs until the peer sends a
//! close frame, the stream ends or fails, or the manager cancels it, and
//! fires its closed signal exactly once on the way out. Cancellation also
//! interrupts a wait on a slow message handler, so the read half is dropped
//! even while a handler is stuck. When the loop ends
//! for any reason other than cancellation it asks the manager to tear the
//! session down.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, warn};

use crate::{
    dispatcher::Dispatcher,
    metrics::{self, Direction},
    signal::Signal,
    transport::FrameStream,
};

/// Why the receive loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The peer sent a close frame.
    PeerClosed,
    /// The stream ended without a close frame.
    EndOfStream,
    /// Reading from the stream failed.
    Failed,
    /// The manager cancelled the loop.
    Cancelled,
}

impl Termination {
    fn ends_session(self) -> bool { !matches!(self, Self::Cancelled) }
}

/// Manager-side handle on a running receive loop.
///
/// Dropping the handle cancels the loop.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    closed: Signal,
    cancel: CancellationToken,
}

impl ListenerHandle {
    /// Fires once the loop has terminated.
    pub(crate) fn closed(&self) -> &Signal { &self.closed }

    /// Ask the loop to stop at its next frame boundary.
    pub(crate) fn cancel(&self) { self.cancel.cancel(); }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) { self.cancel.cancel(); }
}

/// Spawn the receive loop on the current runtime.
///
/// `on_session_end` runs after the closed signal fires, and only when the
/// loop ended on its own rather than through [`ListenerHandle::cancel`].
pub(crate) fn spawn_listener<F>(
    stream: FrameStream,
    dispatcher: Dispatcher,
    on_session_end: F,
    span: Span,
) -> ListenerHandle
where
    F: FnOnce() + Send + 'static,
{
    let closed = Signal::new();
    let cancel = CancellationToken::new();
    let task_closed = closed.clone();
    let task_cancel = cancel.clone();
    tokio::spawn(
        async move {
            let termination = listen(stream, &dispatcher, &task_cancel).await;
            debug!(?termination, "receive loop finished");
            task_closed.fire();
            if termination.ends_session() {
                on_session_end();
            }
        }
        .instrument(span),
    );
    ListenerHandle { closed, cancel }
}

async fn listen(
    mut stream: FrameStream,
    dispatcher: &Dispatcher,
    cancel: &CancellationToken,
) -> Termination {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Termination::Cancelled,
            next = stream.next() => next,
        };
        let frame = match next {
            None => return Termination::EndOfStream,
            Some(Err(err)) => {
                warn!(error = %err, "failed to read from connection");
                return Termination::Failed;
            }
            Some(Ok(frame)) => frame,
        };
        metrics::inc_frames(Direction::Inbound);
        let Some(payload) = frame.payload() else {
            debug!("peer sent close frame");
            return Termination::PeerClosed;
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Termination::Cancelled,
            () = dispatcher.dispatch(payload) => {}
        }
    }
}
