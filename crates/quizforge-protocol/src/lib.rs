//! Wire protocol for Quizforge.
//!
//! Every message in either direction is a single text frame holding a JSON
//! envelope:
//!
//! ```text
//! { "type": "joinGame", "payload": { "gameCode": "482913", "name": "Alice" } }
//! ```
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RoomCode`], ...):
//!   what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about rooms or connections:
//!
//! ```text
//! Transport (frames) → Protocol (messages) → Router (roles, sessions)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, InboundEnvelope, LeaderboardEntry, QuestionPayload,
    RoomCode, ServerMessage,
};
