//! Codec trait and the JSON implementation.
//!
//! The router never calls `serde_json` directly; it goes through a
//! [`Codec`], so tests and alternative front ends can swap the encoding
//! without touching routing code.

use serde::{de::DeserializeOwned, Serialize};

use crate::{ClientMessage, InboundEnvelope, ProtocolError};

/// Converts messages to text frames and back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the life of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a raw frame into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Decodes an inbound frame all the way to a typed [`ClientMessage`].
    ///
    /// Fails with [`ProtocolError::Decode`] for frames that aren't an
    /// envelope at all, [`ProtocolError::UnknownType`] for envelopes with a
    /// `type` we don't handle, and [`ProtocolError::InvalidPayload`] when the
    /// payload has the wrong shape.
    fn decode_client(
        &self,
        data: &[u8],
    ) -> Result<ClientMessage, ProtocolError> {
        let envelope: InboundEnvelope = self.decode(data)?;
        ClientMessage::from_envelope(envelope)
    }
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use quizforge_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg = codec
///     .decode_client(br#"{"type":"submitAnswer","payload":{"answerIndex":2}}"#)
///     .unwrap();
/// assert_eq!(msg, ClientMessage::SubmitAnswer { answer_index: Some(2) });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
