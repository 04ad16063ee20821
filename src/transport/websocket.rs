//! Websocket transport built on `tokio-tungstenite`.
//!
//! Text and binary messages map to data frames and a close message maps to
//! [`Frame::Close`]. Ping and pong traffic is answered by the library and
//! never surfaces as a frame.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error as WsError,
        Message,
        Utf8Bytes,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use super::{Connector, Frame, Transport, TransportError};

/// Dials `ws://` and `wss://` endpoints.
///
/// # Examples
///
/// ```no_run
/// use nym_socket::transport::{Connector, WebSocketConnector};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), nym_socket::transport::TransportError> {
/// let transport = WebSocketConnector.connect("ws://127.0.0.1:1977").await?;
/// let (_sink, _stream) = transport.into_parts();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, address: &str) -> Result<Transport, TransportError> {
        let (socket, _response) = connect_async(address).await?;
        let (sink, stream) = socket.split();
        let sink = sink
            .sink_map_err(TransportError::from)
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(outbound(frame))));
        let stream = stream.filter_map(|item| future::ready(inbound(item)));
        Ok(Transport::new(sink, stream))
    }
}

fn outbound(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::text(text),
        Frame::Binary(bytes) => Message::binary(bytes),
        Frame::Close => Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static(""),
        })),
    }
}

fn inbound(item: Result<Message, WsError>) -> Option<Result<Frame, TransportError>> {
    match item {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes))),
        Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(error) => Some(Err(error.into())),
    }
}
