//! Message router: decodes inbound frames, checks the sender's role, and
//! forwards the request to the right session.
//!
//! Failures never change state. They are reported to the sender only, as
//! `joinError` for a `joinGame` and as `error` for everything else.

use quizforge_directory::{ConnectionDirectory, Outbox, Role};
use quizforge_protocol::{
    ClientMessage, Codec, JsonCodec, ProtocolError, RoomCode, ServerMessage,
};
use quizforge_session::{QuizError, SessionHandle, SessionRegistry};
use quizforge_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::QuizforgeError;

/// `gameEnded` reason sent to players when their host disconnects.
pub const HOST_LEFT: &str = "the host left the game";

/// `serverShutdown` message sent on a graceful stop.
pub const SERVER_RESTARTING: &str = "the server is restarting";

const ALREADY_IN_GAME: &str = "you are already in a game";
const UNKNOWN_CONNECTION: &str = "unknown connection";

/// Routes client messages to sessions.
///
/// Shared by every connection task behind an `Arc`. The directory lock is
/// never held across an `.await` on a session or the registry.
pub struct Router<C: Codec = JsonCodec> {
    codec: C,
    directory: Mutex<ConnectionDirectory>,
    registry: SessionRegistry,
}

impl<C: Codec> Router<C> {
    /// Creates a router over `registry` with no connections.
    pub fn new(codec: C, registry: SessionRegistry) -> Self {
        Self {
            codec,
            directory: Mutex::new(ConnectionDirectory::new()),
            registry,
        }
    }

    /// The codec used for every frame.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// Fails if the connection id is already registered.
    pub async fn connect(&self, outbox: Outbox) -> Result<(), QuizforgeError> {
        self.directory.lock().await.register(outbox)?;
        Ok(())
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.directory.lock().await.len()
    }

    /// The current role of a connection.
    pub async fn role(&self, conn: ConnectionId) -> Option<Role> {
        self.directory.lock().await.role(conn).cloned()
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Decodes one raw frame and handles it.
    pub async fn handle_frame(&self, conn: ConnectionId, data: &[u8]) {
        match self.codec.decode_client(data) {
            Ok(msg) => self.dispatch(conn, msg).await,
            Err(ProtocolError::UnknownType(kind)) => {
                tracing::debug!(%conn, %kind, "unknown message type");
                self.reply(conn, error("unknown message type")).await;
            }
            Err(ProtocolError::InvalidPayload { kind: "joinGame", source }) => {
                tracing::debug!(%conn, error = %source, "malformed joinGame");
                self.reply(
                    conn,
                    ServerMessage::JoinError {
                        error: "invalid game code or name".into(),
                    },
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(%conn, error = %e, "malformed frame");
                self.reply(conn, error("invalid message")).await;
            }
        }
    }

    /// Handles one decoded message from `conn`.
    pub async fn dispatch(&self, conn: ConnectionId, msg: ClientMessage) {
        let kind = msg.kind();
        tracing::debug!(%conn, kind, "message received");

        let result = match msg {
            ClientMessage::CreateGame => self.create_game(conn).await,
            ClientMessage::JoinGame { game_code, name } => {
                self.join_game(conn, game_code, name).await
            }
            ClientMessage::StartGame => self.start_game(conn).await,
            ClientMessage::NextQuestion => self.next_question(conn).await,
            ClientMessage::SubmitAnswer { answer_index } => {
                self.submit_answer(conn, answer_index).await
            }
        };

        if let Err(err) = result {
            tracing::debug!(
                %conn,
                kind,
                error = %err,
                class = ?err.kind(),
                "request rejected"
            );
            let reply = match kind {
                "joinGame" => ServerMessage::JoinError {
                    error: err.to_string(),
                },
                _ => error(&err.to_string()),
            };
            self.reply(conn, reply).await;
        }
    }

    async fn create_game(&self, conn: ConnectionId) -> Result<(), QuizError> {
        self.ensure_unassigned(conn).await?;
        let outbox = self.outbox_of(conn).await?;

        let handle = self.registry.create(outbox.clone()).await?;
        let code = handle.code().clone();

        let assigned = self.directory.lock().await.assign_host(
            conn,
            code.clone(),
            handle.id(),
        );
        if let Err(e) = assigned {
            tracing::warn!(%conn, %code, error = %e, "could not record host");
            self.registry.end_hosted(&code, conn, HOST_LEFT).await;
            return Err(QuizError::Unauthorized(ALREADY_IN_GAME));
        }

        outbox.send(ServerMessage::GameCreated {
            game_code: code.clone(),
        });
        tracing::info!(%conn, %code, "game created");
        Ok(())
    }

    async fn join_game(
        &self,
        conn: ConnectionId,
        game_code: Option<String>,
        name: Option<String>,
    ) -> Result<(), QuizError> {
        self.ensure_unassigned(conn).await?;

        let code = game_code
            .map(|c| RoomCode::new(c.trim()))
            .filter(|c| !c.as_str().is_empty())
            .ok_or_else(|| {
                QuizError::Validation("a game code is required".into())
            })?;
        let name = name.ok_or_else(|| {
            QuizError::Validation("a name is required".into())
        })?;
        if !code.is_well_formed() {
            return Err(QuizError::NotFound(code));
        }

        let handle = self.registry.require(&code).await?;
        let outbox = self.outbox_of(conn).await?;
        let name = handle.join(outbox, name).await?;

        let assigned = self.directory.lock().await.assign_player(
            conn,
            code.clone(),
            handle.id(),
            name.clone(),
        );
        if let Err(e) = assigned {
            tracing::warn!(%conn, %code, error = %e, "could not record player");
            let _ = handle.leave(conn).await;
            return Err(QuizError::Unauthorized(ALREADY_IN_GAME));
        }

        tracing::info!(%conn, %code, %name, "player joined");
        Ok(())
    }

    async fn start_game(&self, conn: ConnectionId) -> Result<(), QuizError> {
        self.hosted_session(conn, "only the host can start the game")
            .await?
            .start()
            .await
    }

    async fn next_question(&self, conn: ConnectionId) -> Result<(), QuizError> {
        self.hosted_session(conn, "only the host can advance the game")
            .await?
            .advance()
            .await
    }

    async fn submit_answer(
        &self,
        conn: ConnectionId,
        answer_index: Option<usize>,
    ) -> Result<(), QuizError> {
        let Role::Player { code, session, .. } = self.role_of(conn).await?
        else {
            return Err(QuizError::Unauthorized(
                "only players can submit answers",
            ));
        };
        let choice = answer_index.ok_or_else(|| {
            QuizError::Validation("an answer index is required".into())
        })?;
        let handle = self.registry.require(&code).await?;
        if handle.id() != session {
            return Err(QuizError::NotFound(code));
        }
        handle.submit(conn, choice).await
    }

    // -----------------------------------------------------------------
    // Disconnect and shutdown
    // -----------------------------------------------------------------

    /// Forgets a connection and cleans up after it.
    ///
    /// A departing host ends their game for everyone. A departing player
    /// is removed from their session. Calling this twice is harmless.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let Some(record) = self.directory.lock().await.remove(conn) else {
            return;
        };

        match record.role {
            Role::Unassigned => {
                tracing::debug!(%conn, "unassigned connection left");
            }
            Role::Host { code, .. } => {
                if self.registry.end_hosted(&code, conn, HOST_LEFT).await {
                    tracing::info!(%conn, %code, "host disconnected, game ended");
                }
            }
            Role::Player {
                code,
                session,
                name,
            } => {
                let Some(handle) = self.registry.get(&code).await else {
                    return;
                };
                if handle.id() != session {
                    return;
                }
                if let Ok(Some(_)) = handle.leave(conn).await {
                    tracing::info!(%conn, %code, %name, "player left");
                }
            }
        }
    }

    /// Tells every connection the server is going away, closes them, and
    /// stops every session.
    pub async fn shutdown(&self, message: &str) {
        let outboxes: Vec<Outbox> =
            self.directory.lock().await.outboxes().cloned().collect();
        tracing::info!(connections = outboxes.len(), "notifying clients of shutdown");

        for outbox in &outboxes {
            outbox.send(ServerMessage::ServerShutdown {
                message: message.to_string(),
            });
            outbox.close();
        }
        self.registry.shutdown_all().await;
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    async fn reply(&self, conn: ConnectionId, msg: ServerMessage) {
        if let Some(outbox) = self.directory.lock().await.outbox(conn) {
            outbox.send(msg);
        }
    }

    async fn outbox_of(&self, conn: ConnectionId) -> Result<Outbox, QuizError> {
        self.directory
            .lock()
            .await
            .outbox(conn)
            .cloned()
            .ok_or(QuizError::Unauthorized(UNKNOWN_CONNECTION))
    }

    async fn role_of(&self, conn: ConnectionId) -> Result<Role, QuizError> {
        self.role(conn)
            .await
            .ok_or(QuizError::Unauthorized(UNKNOWN_CONNECTION))
    }

    /// Succeeds if `conn` is free to create or join a game.
    ///
    /// A role stays binding while its session holds the code and has not
    /// finished. Otherwise the role is cleared, and a finished session the
    /// connection still belongs to lets go of it first.
    async fn ensure_unassigned(&self, conn: ConnectionId) -> Result<(), QuizError> {
        let role = self.role_of(conn).await?;
        let Some((code, session)) = role.membership() else {
            return Ok(());
        };

        let current = self
            .registry
            .get(code)
            .await
            .filter(|h| h.id() == session);
        if let Some(handle) = current {
            let in_play = handle
                .info()
                .await
                .is_ok_and(|info| !info.state.is_terminal());
            if in_play {
                return Err(QuizError::Unauthorized(ALREADY_IN_GAME));
            }
            match &role {
                Role::Host { .. } => {
                    self.registry.close_hosted(code, conn).await;
                }
                _ => {
                    let _ = handle.leave(conn).await;
                }
            }
        }

        self.directory.lock().await.reset_role(conn);
        tracing::debug!(%conn, %code, %session, "cleared role from an ended game");
        Ok(())
    }

    /// The session `conn` hosts, or `denied` as an authorization error.
    async fn hosted_session(
        &self,
        conn: ConnectionId,
        denied: &'static str,
    ) -> Result<SessionHandle, QuizError> {
        let Role::Host { code, session } = self.role_of(conn).await? else {
            return Err(QuizError::Unauthorized(denied));
        };
        let handle = self.registry.require(&code).await?;
        // The code may have been reused by someone else's game.
        if handle.id() != session {
            return Err(QuizError::NotFound(code));
        }
        Ok(handle)
    }
}

fn error(text: &str) -> ServerMessage {
    ServerMessage::Error {
        error: text.to_string(),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Naming follows `test_{function}_{scenario}_{expected}`.

    use std::time::Duration;

    use quizforge_directory::Outbound;
    use quizforge_session::{CodeSource, QuestionBank, QuizConfig};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    struct Client {
        id: ConnectionId,
        rx: UnboundedReceiver<Outbound>,
    }

    impl Client {
        async fn connect(router: &Router, id: u64) -> Self {
            let (outbox, rx) = Outbox::channel(ConnectionId::new(id));
            router.connect(outbox).await.unwrap();
            Self {
                id: ConnectionId::new(id),
                rx,
            }
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(item) = self.rx.try_recv() {
                if let Outbound::Message(msg) = item {
                    out.push(msg);
                }
            }
            out
        }

        fn last(&mut self) -> ServerMessage {
            self.drain().pop().expect("a message was queued")
        }
    }

    fn router() -> Router {
        Router::new(
            JsonCodec,
            SessionRegistry::new(QuizConfig::default(), QuestionBank::default()),
        )
    }

    fn one_question_router() -> Router {
        let config = QuizConfig {
            questions_per_game: 1,
            ..QuizConfig::default()
        };
        Router::new(
            JsonCodec,
            SessionRegistry::new(config, QuestionBank::default()),
        )
    }

    /// Hands out the same code every time.
    struct FixedCode(&'static str);

    impl CodeSource for FixedCode {
        fn next_code(&mut self) -> RoomCode {
            RoomCode::new(self.0)
        }
    }

    /// Plays a one-question game to `gameOver` with `player` as "Alice".
    async fn finish_game(
        router: &Router,
        host: &mut Client,
        player: &mut Client,
    ) -> RoomCode {
        let code = create(router, host).await;
        router.dispatch(player.id, join(&code, "Alice")).await;
        router.dispatch(host.id, ClientMessage::StartGame).await;
        router
            .dispatch(
                player.id,
                ClientMessage::SubmitAnswer {
                    answer_index: Some(0),
                },
            )
            .await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(
            player.drain().last().map(ServerMessage::kind),
            Some("gameOver")
        );
        host.drain();
        code
    }

    async fn create(router: &Router, host: &mut Client) -> RoomCode {
        router.dispatch(host.id, ClientMessage::CreateGame).await;
        match host.last() {
            ServerMessage::GameCreated { game_code } => game_code,
            other => panic!("expected gameCreated, got {other:?}"),
        }
    }

    fn join(code: &RoomCode, name: &str) -> ClientMessage {
        ClientMessage::JoinGame {
            game_code: Some(code.as_str().to_string()),
            name: Some(name.to_string()),
        }
    }

    /// Lets session actors process what was just sent to them.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_game_assigns_host_role() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;

        let code = create(&router, &mut host).await;

        assert!(code.is_well_formed());
        assert!(matches!(
            router.role(host.id).await,
            Some(Role::Host { code: c, .. }) if c == code
        ));
        assert!(router.registry().contains(&code).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_game_twice_rejected() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        create(&router, &mut host).await;

        router.dispatch(host.id, ClientMessage::CreateGame).await;

        assert_eq!(host.last(), error(ALREADY_IN_GAME));
        assert_eq!(router.registry().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_game_unknown_code_sends_join_error() {
        let router = router();
        let mut player = Client::connect(&router, 1).await;

        router
            .dispatch(player.id, join(&RoomCode::new("999999"), "Alice"))
            .await;

        assert_eq!(
            player.last(),
            ServerMessage::JoinError {
                error: "game not found".into()
            }
        );
        assert_eq!(router.role(player.id).await, Some(Role::Unassigned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_game_missing_fields_sends_join_error() {
        let router = router();
        let mut player = Client::connect(&router, 1).await;

        router
            .dispatch(
                player.id,
                ClientMessage::JoinGame {
                    game_code: None,
                    name: Some("Alice".into()),
                },
            )
            .await;

        assert!(matches!(player.last(), ServerMessage::JoinError { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_game_duplicate_name_rejected() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        let mut alice = Client::connect(&router, 2).await;
        let mut imposter = Client::connect(&router, 3).await;
        let code = create(&router, &mut host).await;

        router.dispatch(alice.id, join(&code, "Alice")).await;
        router.dispatch(imposter.id, join(&code, " Alice ")).await;

        assert_eq!(
            alice.last(),
            ServerMessage::JoinSuccess {
                name: "Alice".into()
            }
        );
        assert!(matches!(
            imposter.last(),
            ServerMessage::JoinError { error } if error.contains("already taken")
        ));
        assert_eq!(router.role(imposter.id).await, Some(Role::Unassigned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_game_by_player_unauthorized() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        let mut alice = Client::connect(&router, 2).await;
        let code = create(&router, &mut host).await;
        router.dispatch(alice.id, join(&code, "Alice")).await;
        alice.drain();

        router.dispatch(alice.id, ClientMessage::StartGame).await;

        assert_eq!(alice.last(), error("only the host can start the game"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_game_empty_room_reports_error() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        create(&router, &mut host).await;

        router.dispatch(host.id, ClientMessage::StartGame).await;

        assert!(matches!(host.last(), ServerMessage::Error { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_answer_by_host_unauthorized() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        create(&router, &mut host).await;

        router
            .dispatch(
                host.id,
                ClientMessage::SubmitAnswer {
                    answer_index: Some(0),
                },
            )
            .await;

        assert_eq!(host.last(), error("only players can submit answers"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_frame_unknown_type_reports_error() {
        let router = router();
        let mut conn = Client::connect(&router, 1).await;

        router
            .handle_frame(conn.id, br#"{"type":"dance","payload":{}}"#)
            .await;

        assert_eq!(conn.last(), error("unknown message type"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_frame_garbage_reports_generic_error() {
        let router = router();
        let mut conn = Client::connect(&router, 1).await;

        router.handle_frame(conn.id, b"not json").await;

        assert_eq!(conn.last(), error("invalid message"));
        assert_eq!(router.role(conn.id).await, Some(Role::Unassigned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_host_ends_game_for_players() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        let mut alice = Client::connect(&router, 2).await;
        let code = create(&router, &mut host).await;
        router.dispatch(alice.id, join(&code, "Alice")).await;
        alice.drain();

        router.disconnect(host.id).await;
        settle().await;

        assert_eq!(
            alice.drain(),
            vec![ServerMessage::GameEnded {
                reason: HOST_LEFT.into()
            }]
        );
        assert!(!router.registry().contains(&code).await);
        assert_eq!(router.connection_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_game_after_host_left_clears_stale_role() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        let mut alice = Client::connect(&router, 2).await;
        let code = create(&router, &mut host).await;
        router.dispatch(alice.id, join(&code, "Alice")).await;
        router.disconnect(host.id).await;
        settle().await;
        alice.drain();

        let own = create(&router, &mut alice).await;

        assert!(matches!(
            router.role(alice.id).await,
            Some(Role::Host { code, .. }) if code == own
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_game_after_game_over_allowed() {
        let router = one_question_router();
        let mut host = Client::connect(&router, 1).await;
        let mut alice = Client::connect(&router, 2).await;
        finish_game(&router, &mut host, &mut alice).await;

        let new = create(&router, &mut host).await;
        settle().await;

        assert!(matches!(
            router.role(host.id).await,
            Some(Role::Host { code, .. }) if code == new
        ));
        assert!(alice.drain().is_empty());
        assert!(host.drain().is_empty());
        assert_eq!(router.registry().len().await, 1);
        assert!(router.registry().contains(&new).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_game_after_game_over_allowed() {
        let router = one_question_router();
        let mut host = Client::connect(&router, 1).await;
        let mut alice = Client::connect(&router, 2).await;
        let mut other_host = Client::connect(&router, 3).await;
        let old = finish_game(&router, &mut host, &mut alice).await;
        let next = create(&router, &mut other_host).await;

        router.dispatch(alice.id, join(&next, "Alice")).await;

        assert_eq!(
            alice.last(),
            ServerMessage::JoinSuccess {
                name: "Alice".into()
            }
        );
        assert!(matches!(
            router.role(alice.id).await,
            Some(Role::Player { code, .. }) if code == next
        ));
        // The finished room let go of her.
        let info = router.registry().require(&old).await.unwrap().info().await;
        assert_eq!(info.unwrap().player_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_game_while_game_running_rejected() {
        let router = one_question_router();
        let mut host = Client::connect(&router, 1).await;
        let mut other_host = Client::connect(&router, 2).await;
        let mut alice = Client::connect(&router, 3).await;
        let code = create(&router, &mut host).await;
        let other = create(&router, &mut other_host).await;
        router.dispatch(alice.id, join(&code, "Alice")).await;
        router.dispatch(host.id, ClientMessage::StartGame).await;
        alice.drain();

        router.dispatch(alice.id, join(&other, "Alice")).await;

        assert_eq!(
            alice.last(),
            ServerMessage::JoinError {
                error: ALREADY_IN_GAME.into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_game_after_code_reused_allowed() {
        let router = Router::new(
            JsonCodec,
            SessionRegistry::with_code_source(
                QuizConfig::default(),
                QuestionBank::default(),
                FixedCode("111111"),
            ),
        );
        let mut first_host = Client::connect(&router, 1).await;
        let mut second_host = Client::connect(&router, 2).await;
        let mut alice = Client::connect(&router, 3).await;
        let code = create(&router, &mut first_host).await;
        router.dispatch(alice.id, join(&code, "Alice")).await;
        router.disconnect(first_host.id).await;
        settle().await;
        let reused = create(&router, &mut second_host).await;
        assert_eq!(reused, code);
        alice.drain();

        router.dispatch(alice.id, join(&reused, "Alice")).await;

        assert_eq!(
            alice.last(),
            ServerMessage::JoinSuccess {
                name: "Alice".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_player_updates_roster() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        let alice = Client::connect(&router, 2).await;
        let bob = Client::connect(&router, 3).await;
        let code = create(&router, &mut host).await;
        router.dispatch(alice.id, join(&code, "Alice")).await;
        router.dispatch(bob.id, join(&code, "Bob")).await;
        host.drain();

        router.disconnect(alice.id).await;

        assert_eq!(
            host.last(),
            ServerMessage::UpdatePlayers {
                players: vec!["Bob".into()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_notifies_and_closes_everyone() {
        let router = router();
        let mut host = Client::connect(&router, 1).await;
        let mut idle = Client::connect(&router, 2).await;
        create(&router, &mut host).await;
        host.drain();

        router.shutdown(SERVER_RESTARTING).await;

        for client in [&mut host, &mut idle] {
            assert_eq!(
                client.rx.try_recv().unwrap(),
                Outbound::Message(ServerMessage::ServerShutdown {
                    message: SERVER_RESTARTING.into()
                })
            );
            assert_eq!(client.rx.try_recv().unwrap(), Outbound::Close);
        }
        assert!(router.registry().is_empty().await);
    }
}
