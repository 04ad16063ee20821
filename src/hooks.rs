//! Application callbacks invoked by the receive loop.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{message::ReceivedMessage, sender::Replier};

/// A boxed future that is `Send` with a specified lifetime.
///
/// This type alias reduces verbosity in handler type signatures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler invoked once per inbound application message.
///
/// The handler receives the decoded message and a [`Replier`] bound to the
/// connection the message arrived on, so it can answer without holding a
/// reference to the manager.
///
/// Each invocation runs on its own task, and the receive loop waits for it
/// before dispatching the next frame, so a slow handler delays every message
/// behind it. Handlers that need to do lengthy work should hand it to a
/// separate task.
///
/// When the session is torn down the receive loop stops waiting and drops
/// the read half. The handler task is detached and left to finish; a handler
/// that never completes keeps its task alive.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use nym_socket::{ClientRequest, hooks::MessageHandler};
///
/// let echo: MessageHandler = Arc::new(|message, replier| {
///     Box::pin(async move {
///         if let Some(tag) = message.sender_tag {
///             let _ = replier.send(&ClientRequest::reply(tag, message.message)).await;
///         }
///     })
/// });
/// ```
pub type MessageHandler =
    Arc<dyn Fn(ReceivedMessage, Replier) -> BoxFuture<'static, ()> + Send + Sync>;

/// Box an async closure into a [`MessageHandler`].
pub(crate) fn message_handler<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(ReceivedMessage, Replier) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message, replier| Box::pin(f(message, replier)))
}
