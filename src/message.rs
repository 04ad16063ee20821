//! Messages exchanged with the Nym client websocket API.
//!
//! Every frame is a JSON object whose `"type"` field selects the variant.
//! Requests flow from this crate to the Nym client; responses flow back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator values used on the wire.
pub mod kind {
    /// Identity request and its reply.
    pub const SELF_ADDRESS: &str = "selfAddress";
    /// Application-level error reported by the Nym client.
    pub const ERROR: &str = "error";
    /// Application data delivered from the mixnet.
    pub const RECEIVED: &str = "received";
    /// Application data sent into the mixnet.
    pub const SEND: &str = "send";
    /// Anonymous reply using a sender tag.
    pub const REPLY: &str = "reply";
}

/// Requests sent to the Nym client.
///
/// # Examples
///
/// ```
/// use nym_socket::{ClientRequest, codec};
///
/// let json = codec::encode(&ClientRequest::SelfAddress).expect("encode");
/// assert_eq!(json, r#"{"type":"selfAddress"}"#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Ask the Nym client for the address assigned to this connection.
    SelfAddress,
    /// Send `message` to `recipient` through the mixnet.
    Send {
        /// Message body.
        message: String,
        /// Nym address of the recipient.
        recipient: String,
        /// Attach single-use reply blocks so the recipient can answer
        /// anonymously.
        #[serde(rename = "withReplySurb")]
        with_reply_surb: bool,
    },
    /// Answer an anonymous sender identified by `sender_tag`.
    Reply {
        /// Message body.
        message: String,
        /// Tag carried by the message being answered.
        #[serde(rename = "senderTag")]
        sender_tag: String,
    },
}

impl ClientRequest {
    /// Build a `send` request without reply blocks.
    #[must_use]
    pub fn send(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
            recipient: recipient.into(),
            with_reply_surb: false,
        }
    }

    /// Build a `send` request that lets the recipient reply anonymously.
    #[must_use]
    pub fn send_with_reply_surb(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
            recipient: recipient.into(),
            with_reply_surb: true,
        }
    }

    /// Build a `reply` request.
    #[must_use]
    pub fn reply(sender_tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reply {
            message: message.into(),
            sender_tag: sender_tag.into(),
        }
    }

    /// Wire discriminator of this request.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SelfAddress => kind::SELF_ADDRESS,
            Self::Send { .. } => kind::SEND,
            Self::Reply { .. } => kind::REPLY,
        }
    }
}

/// Reply to a [`ClientRequest::SelfAddress`] request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SelfAddressReply {
    /// Address the Nym client assigned to this connection.
    pub address: String,
}

/// Error reported by the Nym client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorReply {
    /// Peer-supplied description.
    pub message: String,
}

/// Application data delivered from the mixnet.
///
/// Fields the crate does not interpret are preserved in [`extra`](Self::extra).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReceivedMessage {
    /// Message body. Older clients name this field `payload`.
    #[serde(default, alias = "payload")]
    pub message: String,
    /// Tag for anonymous replies, present when the sender attached reply
    /// blocks.
    #[serde(default, rename = "senderTag")]
    pub sender_tag: Option<String>,
    /// Remaining payload fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerResponse {
    /// Identity reply.
    SelfAddress(SelfAddressReply),
    /// Peer-reported error.
    Error(ErrorReply),
    /// Application data.
    Received(ReceivedMessage),
    /// A well-formed frame with a discriminator this crate does not handle.
    Unknown {
        /// The unrecognised discriminator.
        kind: String,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::ClientRequest;

    #[rstest]
    #[case(ClientRequest::SelfAddress, json!({"type": "selfAddress"}))]
    #[case(
        ClientRequest::send("alice.nym", "hi"),
        json!({"type": "send", "message": "hi", "recipient": "alice.nym", "withReplySurb": false})
    )]
    #[case(
        ClientRequest::send_with_reply_surb("alice.nym", "hi"),
        json!({"type": "send", "message": "hi", "recipient": "alice.nym", "withReplySurb": true})
    )]
    #[case(
        ClientRequest::reply("tag-1", "pong"),
        json!({"type": "reply", "message": "pong", "senderTag": "tag-1"})
    )]
    fn requests_serialize_to_nym_shapes(
        #[case] request: ClientRequest,
        #[case] expected: serde_json::Value,
    ) {
        let value = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(value, expected);
        assert_eq!(value["type"], request.kind());
    }
}
