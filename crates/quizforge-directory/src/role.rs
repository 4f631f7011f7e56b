//! What a connection is to the server.

use quizforge_protocol::RoomCode;

use crate::Outbox;

/// Registry-assigned generation number of a session.
///
/// Room codes can be reused once a session is gone; the id tells two
/// sessions that shared a code apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The part a connection plays.
///
/// ```text
///   Unassigned ──→ Host { code, session }
///        │
///        └──────→ Player { code, session, name }
/// ```
///
/// A connection hosts or plays in at most one room. `session` pins the
/// role to the session that held `code` when the role was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Role {
    /// Connected but hasn't created or joined a room yet.
    #[default]
    Unassigned,
    /// Created the room with this code.
    Host { code: RoomCode, session: SessionId },
    /// Joined the room with this code under this name.
    Player {
        code: RoomCode,
        session: SessionId,
        name: String,
    },
}

impl Role {
    /// The room and session this connection belongs to, if any.
    pub fn membership(&self) -> Option<(&RoomCode, SessionId)> {
        match self {
            Self::Unassigned => None,
            Self::Host { code, session } | Self::Player { code, session, .. } => {
                Some((code, *session))
            }
        }
    }
}

/// The directory's record of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    /// Where to send this connection's messages.
    pub outbox: Outbox,
    /// Current role.
    pub role: Role,
}
