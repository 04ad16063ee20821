//! JSON wire codec for the Nym client websocket API.
//!
//! Decoding is two-stage: the frame is first read generically to find its
//! `"type"` discriminator, and only then decoded into the matching variant.
//! A frame is never assumed to have a particular shape before its tag has
//! been checked.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    error::{DecodeError, EncodeError},
    message::{ClientRequest, ServerResponse, kind},
};

const TYPE_FIELD: &str = "type";

/// Encode a request as the JSON text written to the wire.
///
/// # Errors
///
/// Returns [`EncodeError`] if serialization fails.
pub fn encode(request: &ClientRequest) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(request)?)
}

/// Decode an inbound frame.
///
/// Frames carrying an unrecognised discriminator decode successfully to
/// [`ServerResponse::Unknown`].
///
/// # Errors
///
/// Returns [`DecodeError`] if the frame is not a JSON object, lacks a string
/// `"type"` attribute, or does not match the shape its discriminator implies.
///
/// # Examples
///
/// ```
/// use nym_socket::{ServerResponse, codec};
///
/// let frame = br#"{"type":"error","message":"boom"}"#;
/// let ServerResponse::Error(reply) = codec::decode(frame).expect("decode") else {
///     panic!("expected an error reply");
/// };
/// assert_eq!(reply.message, "boom");
/// ```
pub fn decode(frame: &[u8]) -> Result<ServerResponse, DecodeError> {
    let (discriminator, fields) = envelope(frame)?;
    match discriminator.as_str() {
        kind::SELF_ADDRESS => variant(kind::SELF_ADDRESS, fields).map(ServerResponse::SelfAddress),
        kind::ERROR => variant(kind::ERROR, fields).map(ServerResponse::Error),
        kind::RECEIVED => variant(kind::RECEIVED, fields).map(ServerResponse::Received),
        _ => Ok(ServerResponse::Unknown {
            kind: discriminator,
        }),
    }
}

/// Split a frame into its discriminator and the remaining fields.
fn envelope(frame: &[u8]) -> Result<(String, Map<String, Value>), DecodeError> {
    let value: Value = serde_json::from_slice(frame).map_err(DecodeError::Malformed)?;
    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };
    match fields.remove(TYPE_FIELD) {
        Some(Value::String(discriminator)) => Ok((discriminator, fields)),
        _ => Err(DecodeError::MissingType),
    }
}

fn variant<T: DeserializeOwned>(
    kind: &'static str,
    fields: Map<String, Value>,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|source| DecodeError::Variant { kind, source })
}
