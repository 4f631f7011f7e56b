//! The connection directory: every live connection and its role.
//!
//! # Concurrency note
//!
//! `ConnectionDirectory` is NOT thread-safe by itself. The router owns one
//! behind a mutex and never holds the lock across an `.await`.

use std::collections::HashMap;

use quizforge_protocol::RoomCode;
use quizforge_transport::ConnectionId;
use crate::{ConnectionRecord, DirectoryError, Outbox, Role, SessionId};

/// Tracks every connected client.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ assign_host() / assign_player() ──→ remove()
///                        │
///                        └──(room gone)──→ reset_role()
/// ```
#[derive(Debug, Default)]
pub struct ConnectionDirectory {
    connections: HashMap<ConnectionId, ConnectionRecord>,
}

impl ConnectionDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly accepted connection with no role.
    ///
    /// # Errors
    /// Returns [`DirectoryError::AlreadyRegistered`] if the id is known.
    pub fn register(&mut self, outbox: Outbox) -> Result<(), DirectoryError> {
        let id = outbox.id();
        if self.connections.contains_key(&id) {
            return Err(DirectoryError::AlreadyRegistered(id));
        }
        self.connections.insert(
            id,
            ConnectionRecord {
                outbox,
                role: Role::Unassigned,
            },
        );
        tracing::debug!(conn = %id, total = self.connections.len(), "connection registered");
        Ok(())
    }

    /// Marks a connection as the host of `session`, reachable as `code`.
    ///
    /// # Errors
    /// - [`DirectoryError::NotRegistered`] if the connection is unknown.
    /// - [`DirectoryError::AlreadyAssigned`] if it already has a role.
    pub fn assign_host(
        &mut self,
        id: ConnectionId,
        code: RoomCode,
        session: SessionId,
    ) -> Result<(), DirectoryError> {
        self.assign(id, Role::Host { code, session })
    }

    /// Marks a connection as a player named `name` in `session`.
    ///
    /// # Errors
    /// Same as [`assign_host`](Self::assign_host).
    pub fn assign_player(
        &mut self,
        id: ConnectionId,
        code: RoomCode,
        session: SessionId,
        name: String,
    ) -> Result<(), DirectoryError> {
        self.assign(id, Role::Player {
            code,
            session,
            name,
        })
    }

    fn assign(
        &mut self,
        id: ConnectionId,
        role: Role,
    ) -> Result<(), DirectoryError> {
        let record = self
            .connections
            .get_mut(&id)
            .ok_or(DirectoryError::NotRegistered(id))?;
        if record.role != Role::Unassigned {
            return Err(DirectoryError::AlreadyAssigned(id));
        }
        tracing::debug!(conn = %id, ?role, "role assigned");
        record.role = role;
        Ok(())
    }

    /// Puts a connection back to [`Role::Unassigned`].
    ///
    /// Used once the game it pointed at is over or gone.
    pub fn reset_role(&mut self, id: ConnectionId) {
        if let Some(record) = self.connections.get_mut(&id) {
            record.role = Role::Unassigned;
        }
    }

    /// Looks up a connection's role.
    pub fn role(&self, id: ConnectionId) -> Option<&Role> {
        self.connections.get(&id).map(|r| &r.role)
    }

    /// Looks up a connection's outbox.
    pub fn outbox(&self, id: ConnectionId) -> Option<&Outbox> {
        self.connections.get(&id).map(|r| &r.outbox)
    }

    /// Forgets a connection, returning its last record.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionRecord> {
        let removed = self.connections.remove(&id);
        if removed.is_some() {
            tracing::debug!(conn = %id, total = self.connections.len(), "connection removed");
        }
        removed
    }

    /// Every registered outbox, in no particular order.
    pub fn outboxes(&self) -> impl Iterator<Item = &Outbox> {
        self.connections.values().map(|r| &r.outbox)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if nothing is connected.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
