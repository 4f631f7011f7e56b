//! Error types for the protocol layer.
//!
//! Each crate in Quizforge defines its own error enum. A `ProtocolError`
//! always means the bytes on the wire were the problem, never the state of
//! a room or a connection.

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not a well-formed `{type, payload}` envelope.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope parsed, but its `type` is not one we handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The envelope's `type` is known but the payload has the wrong shape,
    /// e.g. `answerIndex` is a string.
    #[error("invalid payload for {kind}: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
