//! Per-connection outbound queues.

use quizforge_protocol::ServerMessage;
use quizforge_transport::ConnectionId;
use tokio::sync::mpsc;

/// An item queued for a connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encode and send this message.
    Message(ServerMessage),
    /// Flush what's queued, then close the socket.
    Close,
}

/// The sending half of a connection's outbound queue.
///
/// Cheap to clone. Sends never block and never fail loudly: once the
/// connection's writer has gone away, everything sent here is dropped.
/// That makes "send to a closed connection" a silent no-op for callers
/// such as a session broadcasting to its players.
#[derive(Debug, Clone)]
pub struct Outbox {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    /// Creates an outbox and the receiver its writer drains.
    pub fn channel(
        id: ConnectionId,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// The connection this outbox writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a message. Returns `false` if the connection is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        let queued = self.tx.send(Outbound::Message(msg)).is_ok();
        if !queued {
            tracing::trace!(conn = %self.id, "dropped message for closed connection");
        }
        queued
    }

    /// Asks the writer to close the connection after flushing.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Whether the writer is still receiving.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(text: &str) -> ServerMessage {
        ServerMessage::Error {
            error: text.into(),
        }
    }

    #[test]
    fn test_send_queues_in_order() {
        let (outbox, mut rx) = Outbox::channel(ConnectionId::new(1));

        assert!(outbox.send(error("a")));
        assert!(outbox.send(error("b")));
        outbox.close();

        assert_eq!(rx.try_recv().unwrap(), Outbound::Message(error("a")));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Message(error("b")));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (outbox, rx) = Outbox::channel(ConnectionId::new(1));
        assert!(outbox.is_open());

        drop(rx);

        assert!(!outbox.is_open());
        assert!(!outbox.send(error("lost")));
        outbox.close(); // must not panic
    }

    #[test]
    fn test_clones_share_the_queue() {
        let (outbox, mut rx) = Outbox::channel(ConnectionId::new(7));
        let clone = outbox.clone();

        clone.send(error("from clone"));

        assert_eq!(clone.id(), ConnectionId::new(7));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(error("from clone"))
        );
    }
}
