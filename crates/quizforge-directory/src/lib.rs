//! Connection bookkeeping for Quizforge.
//!
//! Every accepted connection gets an [`Outbox`]: the only way anything in
//! the server talks back to a client. Sessions hold clones of their
//! members' outboxes; the connection handler owns the receiving end and
//! drains it onto the socket.
//!
//! The [`ConnectionDirectory`] records which role each connection plays:
//!
//! ```text
//!   Unassigned ──(createGame)──→ Host { code, session }
//!        │
//!        └──────(joinGame)────→ Player { code, session, name }
//! ```
//!
//! A role is assigned at most once per connection. Once the game it points
//! at is over or gone, the router resets the role before accepting a new
//! `createGame`/`joinGame`.
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)     ← checks roles before forwarding to a session
//!     ↕
//! Directory (this crate)
//!     ↕
//! Protocol / Transport (below)  ← RoomCode, ServerMessage, ConnectionId
//! ```

mod directory;
mod error;
mod outbox;
mod role;

pub use directory::ConnectionDirectory;
pub use error::DirectoryError;
pub use outbox::{Outbound, Outbox};
pub use role::{ConnectionRecord, Role, SessionId};
