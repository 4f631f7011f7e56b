//! Message types for Quizforge's wire format.
//!
//! Both directions use the same envelope shape, `{ "type", "payload" }`,
//! which maps onto serde's adjacently tagged enums. `rename_all` turns
//! variant names into the camelCase `type` strings and `rename_all_fields`
//! does the same for payload keys (`game_code` → `gameCode`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// RoomCode
// ---------------------------------------------------------------------------

/// A room's join code: six ASCII digits, e.g. `"482913"`.
///
/// Serialized as a bare string. The code is only guaranteed unique among
/// rooms that are live at the same time; it may be reused afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of digits in a room code.
    pub const LEN: usize = 6;

    /// Wraps an existing code string without validating it.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Formats a number in `100000..=999999` as a room code.
    pub fn from_number(n: u32) -> Self {
        Self(format!("{n:06}"))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the code is exactly six ASCII digits.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// The loosely typed envelope as it arrives off the wire.
///
/// Decoding happens in two steps so that an unknown `type` can be told
/// apart from a malformed frame: first this struct, then
/// [`ClientMessage::from_envelope`].
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    /// The message type tag, e.g. `"joinGame"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The message body. Missing or `null` is treated as `{}`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Messages a client can send to the server.
///
/// Payload fields are optional at this layer; the router decides whether a
/// missing `gameCode` or `answerIndex` is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Open a new room with the sender as host.
    CreateGame,

    /// Join an existing room as a player.
    JoinGame {
        #[serde(default)]
        game_code: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },

    /// Host only: leave the lobby and begin the quiz.
    StartGame,

    /// Host only: move from the leaderboard to the next question.
    NextQuestion,

    /// Player only: answer the current question.
    SubmitAnswer {
        #[serde(default)]
        answer_index: Option<usize>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinGamePayload {
    #[serde(default)]
    game_code: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAnswerPayload {
    #[serde(default)]
    answer_index: Option<usize>,
}

impl ClientMessage {
    /// Resolves a raw envelope into a typed message.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownType`] if `type` isn't one of the five
    ///   inbound messages.
    /// - [`ProtocolError::InvalidPayload`] if the payload fields have the
    ///   wrong JSON types.
    pub fn from_envelope(
        envelope: InboundEnvelope,
    ) -> Result<Self, ProtocolError> {
        let payload = match envelope.payload {
            serde_json::Value::Null => {
                serde_json::Value::Object(serde_json::Map::new())
            }
            other => other,
        };

        match envelope.kind.as_str() {
            "createGame" => Ok(Self::CreateGame),
            "startGame" => Ok(Self::StartGame),
            "nextQuestion" => Ok(Self::NextQuestion),
            "joinGame" => {
                let p: JoinGamePayload = parse_payload("joinGame", payload)?;
                Ok(Self::JoinGame {
                    game_code: p.game_code,
                    name: p.name,
                })
            }
            "submitAnswer" => {
                let p: SubmitAnswerPayload =
                    parse_payload("submitAnswer", payload)?;
                Ok(Self::SubmitAnswer {
                    answer_index: p.answer_index,
                })
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    /// The wire `type` string of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateGame => "createGame",
            Self::JoinGame { .. } => "joinGame",
            Self::StartGame => "startGame",
            Self::NextQuestion => "nextQuestion",
            Self::SubmitAnswer { .. } => "submitAnswer",
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    payload: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(payload)
        .map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A question as shown to a client.
///
/// `correct` is only filled in for the host's copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPayload {
    /// The question text.
    pub question: String,
    /// Answer labels in display order.
    pub answers: Vec<String>,
    /// Index of the correct answer (host only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<usize>,
}

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// To the host: your room is open under this code.
    GameCreated { game_code: RoomCode },

    /// To a player: you're in, under this (trimmed) name.
    JoinSuccess { name: String },

    /// To a player: the join was refused.
    JoinError { error: String },

    /// To the host: current roster in join order.
    UpdatePlayers { players: Vec<String> },

    /// To everyone: a new question is live.
    ///
    /// `q_num`/`total` are only sent to the host. `start_time` is Unix
    /// epoch milliseconds.
    NewQuestion {
        question: QuestionPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q_num: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
        start_time: u64,
    },

    /// To one player: how their answer to the last question scored.
    AnswerResult {
        correct: bool,
        score: u32,
        points: u32,
    },

    /// To everyone: standings after a question.
    LeaderboardUpdate {
        leaderboard: Vec<LeaderboardEntry>,
        is_last_question: bool,
    },

    /// To everyone: the quiz is over.
    GameOver { leaderboard: Vec<LeaderboardEntry> },

    /// To players: the room was closed (host left, room evicted).
    GameEnded { reason: String },

    /// To every connection: the server is going away.
    ServerShutdown { message: String },

    /// To one connection: the last request failed.
    Error { error: String },
}

impl ServerMessage {
    /// The wire `type` string of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "gameCreated",
            Self::JoinSuccess { .. } => "joinSuccess",
            Self::JoinError { .. } => "joinError",
            Self::UpdatePlayers { .. } => "updatePlayers",
            Self::NewQuestion { .. } => "newQuestion",
            Self::AnswerResult { .. } => "answerResult",
            Self::LeaderboardUpdate { .. } => "leaderboardUpdate",
            Self::GameOver { .. } => "gameOver",
            Self::GameEnded { .. } => "gameEnded",
            Self::ServerShutdown { .. } => "serverShutdown",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
