//! Error types for the session layer.
//!
//! The `Display` text of a [`QuizError`] is what the client sees in its
//! `error`/`joinError` envelope, so it is phrased for a person.

use quizforge_protocol::RoomCode;

use crate::SessionState;

/// Errors that can occur during quiz operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// No live session has this code.
    #[error("game not found")]
    NotFound(RoomCode),

    /// The connection doesn't hold the role this operation needs.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The session isn't in the state this operation needs.
    #[error("cannot {operation} while the game is in {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Joining after the lobby closed.
    #[error("the game has already started")]
    AlreadyStarted,

    /// Another player in the room already uses this name.
    #[error("the name {0:?} is already taken")]
    NameTaken(String),

    /// This connection already answered the current question.
    #[error("you already answered this question")]
    AlreadySubmitted,

    /// Starting a game with nobody in it.
    #[error("there are no players in the room")]
    EmptyRoom,

    /// The connection isn't a player of this session.
    #[error("you are not a player in this game")]
    NotAPlayer,

    /// Every room code is in use.
    #[error("no free room code available")]
    NoFreeCode,

    /// The session's actor has stopped or isn't accepting commands.
    #[error("game not found")]
    Unavailable(RoomCode),
}

/// Coarse classification of a [`QuizError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input.
    Validation,
    /// The target doesn't exist (or no longer does).
    NotFound,
    /// Wrong role for the operation.
    Authorization,
    /// Operation not valid in the current state.
    InvalidState,
    /// Name already taken, or answer already submitted.
    Duplicate,
    /// Not enough players, or no room codes left.
    Capacity,
}

impl QuizError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) | Self::Unavailable(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) | Self::NotAPlayer => {
                ErrorKind::Authorization
            }
            Self::InvalidState { .. } | Self::AlreadyStarted => {
                ErrorKind::InvalidState
            }
            Self::NameTaken(_) | Self::AlreadySubmitted => ErrorKind::Duplicate,
            Self::EmptyRoom | Self::NoFreeCode => ErrorKind::Capacity,
        }
    }
}
