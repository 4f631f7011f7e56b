//! Unified error type for the Quizforge server.

use quizforge_directory::DirectoryError;
use quizforge_protocol::ProtocolError;
use quizforge_session::{BankError, QuizError};
use quizforge_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A connection bookkeeping error.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A quiz rule was violated or a game is gone.
    #[error(transparent)]
    Quiz(#[from] QuizError),

    /// The question bank could not be loaded.
    #[error(transparent)]
    Bank(#[from] BankError),
}

#[cfg(test)]
mod tests {
    use quizforge_protocol::RoomCode;
    use quizforge_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed("gone".into());
        let wrapped: QuizforgeError = err.into();
        assert!(matches!(wrapped, QuizforgeError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownType("ping".into());
        let wrapped: QuizforgeError = err.into();
        assert!(matches!(wrapped, QuizforgeError::Protocol(_)));
    }

    #[test]
    fn test_from_directory_error() {
        let err = DirectoryError::NotRegistered(ConnectionId::new(3));
        let wrapped: QuizforgeError = err.into();
        assert!(matches!(wrapped, QuizforgeError::Directory(_)));
    }

    #[test]
    fn test_from_quiz_error_keeps_message() {
        let err = QuizError::NotFound(RoomCode::new("123456"));
        let wrapped: QuizforgeError = err.into();
        assert!(matches!(wrapped, QuizforgeError::Quiz(_)));
        assert_eq!(wrapped.to_string(), "game not found");
    }

    #[test]
    fn test_from_bank_error() {
        let wrapped: QuizforgeError = BankError::Empty.into();
        assert!(matches!(wrapped, QuizforgeError::Bank(_)));
    }
}
