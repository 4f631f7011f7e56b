//! Per-connection handler: registration, inbound routing, outbound writes.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Create the connection's outbox and register it with the router
//!   2. Loop: forward inbound frames to the router, drain the outbox onto
//!      the socket
//!   3. On close, error, or an `Outbound::Close`, disconnect from the router

use std::sync::Arc;

use quizforge_directory::{Outbound, Outbox};
use quizforge_protocol::Codec;
use quizforge_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::{QuizforgeError, Router};

/// Drop guard that disconnects a connection from the router when the
/// handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async cleanup.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    router: Arc<Router<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            router.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    router: Arc<Router<C>>,
) -> Result<(), QuizforgeError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbox, mut outbound) = Outbox::channel(conn_id);
    router.connect(outbox).await?;
    let _guard = DisconnectGuard {
        conn_id,
        router: Arc::clone(&router),
    };

    loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => router.handle_frame(conn_id, &data).await,
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            item = outbound.recv() => match item {
                Some(Outbound::Message(msg)) => {
                    let text = router.codec().encode(&msg)?;
                    if let Err(e) = conn.send(&text).await {
                        tracing::debug!(%conn_id, error = %e, "send error");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    tracing::debug!(%conn_id, "closing connection");
                    let _ = conn.close().await;
                    break;
                }
            },
        }
    }

    // _guard drops here → router disconnect fires.
    Ok(())
}
