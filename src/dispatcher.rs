//! Routes inbound frames by their `"type"` discriminator.
//!
//! The dispatcher runs on the receive loop's task, once per data frame.
//! Identity replies update the shared session, error replies are logged, and
//! application messages go to the registered [`MessageHandler`]. Nothing a
//! peer sends here can change the connection state; undecodable or
//! unrecognised frames are logged and dropped.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tracing::{Instrument, debug, error, warn};

use crate::{
    codec,
    hooks::MessageHandler,
    message::{ReceivedMessage, ServerResponse},
    metrics,
    sender::Replier,
    session::SharedSession,
};

pub(crate) struct Dispatcher {
    session: Arc<SharedSession>,
    handler: MessageHandler,
    replier: Replier,
}

impl Dispatcher {
    pub(crate) fn new(session: Arc<SharedSession>, handler: MessageHandler, replier: Replier) -> Self {
        Self {
            session,
            handler,
            replier,
        }
    }

    /// Handle one inbound frame.
    ///
    /// Application messages are handed to the handler and awaited before this
    /// returns, so the next frame is not dispatched until the handler is done.
    pub(crate) async fn dispatch(&self, frame: &[u8]) {
        let response = match codec::decode(frame) {
            Ok(response) => response,
            Err(err) => {
                metrics::inc_dropped_frames();
                warn!(error = %err, frame.bytes = frame.len(), "dropping undecodable frame");
                return;
            }
        };

        match response {
            ServerResponse::SelfAddress(reply) => {
                debug!(identity = %reply.address, "got selfAddress reply");
                if self.session.record_identity(reply.address) {
                    debug!("released pending start");
                }
            }
            ServerResponse::Error(reply) => {
                error!(peer.message = %reply.message, "got error from mixnet");
            }
            ServerResponse::Received(message) => {
                debug!(
                    message.bytes = message.message.len(),
                    sender_tag = ?message.sender_tag,
                    "got message from mixnet"
                );
                self.invoke_handler(message).await;
            }
            ServerResponse::Unknown { kind } => {
                metrics::inc_dropped_frames();
                warn!(kind = %kind, "dropping message with unrecognised type");
            }
        }
    }

    /// Run the handler on its own task and wait for it.
    ///
    /// If the receive loop is cancelled while waiting, the handler task is
    /// detached rather than dropped, so a handler that is itself stopping the
    /// manager finishes its teardown.
    async fn invoke_handler(&self, message: ReceivedMessage) {
        let handler = Arc::clone(&self.handler);
        let replier = self.replier.clone();
        let task = tokio::spawn(
            async move {
                let outcome = AssertUnwindSafe(handler(message, replier))
                    .catch_unwind()
                    .await;
                if let Err(panic) = outcome {
                    metrics::inc_handler_panics();
                    error!(panic = panic_message(panic.as_ref()), "message handler panicked");
                }
            }
            .in_current_span(),
        );
        if let Err(err) = task.await {
            warn!(error = %err, "message handler task failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use rstest::{fixture, rstest};
    use tracing::Span;
    use tracing_test::traced_test;

    use super::{Dispatcher, panic_message};
    use crate::{
        hooks::message_handler,
        message::ReceivedMessage,
        sender::{Replier, SendPath},
        session::SharedSession,
        tracing_config::TracingConfig,
    };

    struct Harness {
        dispatcher: Dispatcher,
        session: Arc<SharedSession>,
        seen: Arc<Mutex<Vec<ReceivedMessage>>>,
    }

    #[fixture]
    fn harness() -> Harness {
        let session = Arc::new(SharedSession::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = message_handler(move |message, _replier| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().expect("seen lock").push(message);
            }
        });
        let replier = Replier::new(SendPath::new(TracingConfig::default(), Span::none()));
        Harness {
            dispatcher: Dispatcher::new(Arc::clone(&session), handler, replier),
            session,
            seen,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn identity_reply_updates_session(harness: Harness) {
        let waiter = harness.session.expect_identity();
        harness
            .dispatcher
            .dispatch(br#"{"type":"selfAddress","address":"me.nym"}"#)
            .await;
        assert!(waiter.is_fired());
        assert_eq!(harness.session.identity(), "me.nym");
    }

    #[rstest]
    #[traced_test]
    #[tokio::test]
    async fn error_reply_is_logged_not_dispatched(harness: Harness) {
        harness
            .dispatcher
            .dispatch(br#"{"type":"error","message":"boom"}"#)
            .await;
        assert!(harness.seen.lock().expect("seen lock").is_empty());
        assert!(logs_contain("got error from mixnet"));
        assert!(logs_contain("boom"));
    }

    #[rstest]
    #[tokio::test]
    async fn received_message_reaches_handler(harness: Harness) {
        harness
            .dispatcher
            .dispatch(br#"{"type":"received","payload":"X"}"#)
            .await;
        let seen = harness.seen.lock().expect("seen lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen.first().map(|m| m.message.as_str()), Some("X"));
    }

    #[traced_test]
    #[rstest]
    #[case(br#"{"type":"mystery"}"#.as_slice())]
    #[case(br#"{"message":"no type"}"#.as_slice())]
    #[case(b"\xff\xfe".as_slice())]
    #[case(br#"{"type":"selfAddress"}"#.as_slice())]
    #[tokio::test]
    async fn unusable_frames_are_dropped(harness: Harness, #[case] frame: &[u8]) {
        harness.dispatcher.dispatch(frame).await;
        assert!(harness.seen.lock().expect("seen lock").is_empty());
        assert_eq!(harness.session.identity(), "");
        assert!(logs_contain("dropping"));
    }

    #[traced_test]
    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let calls = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&calls);
        let handler = message_handler(move |_message, _replier| {
            let count = Arc::clone(&count);
            async move {
                if count.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("handler exploded");
                }
            }
        });
        let replier = Replier::new(SendPath::new(TracingConfig::default(), Span::none()));
        let dispatcher = Dispatcher::new(Arc::new(SharedSession::default()), handler, replier);

        dispatcher.dispatch(br#"{"type":"received","message":"a"}"#).await;
        dispatcher.dispatch(br#"{"type":"received","message":"b"}"#).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(logs_contain("message handler panicked"));
        assert!(logs_contain("handler exploded"));
    }

    #[test]
    fn panic_message_reads_string_payloads() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static");
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
