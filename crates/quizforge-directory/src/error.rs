//! Error types for the directory layer.

use quizforge_transport::ConnectionId;

/// Errors from [`ConnectionDirectory`](crate::ConnectionDirectory).
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The connection was never registered or has already been removed.
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),

    /// `register` was called twice for the same connection.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// The connection is already a host or a player.
    #[error("connection {0} already belongs to a game")]
    AlreadyAssigned(ConnectionId),
}
