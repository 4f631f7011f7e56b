//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! The outside world talks to it through a [`SessionHandle`]; every
//! command and every timer wakeup is handled to completion before the
//! next one starts, so the session needs no locking.

use quizforge_directory::{Outbox, SessionId};
use quizforge_protocol::RoomCode;
use quizforge_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::session::Wakeup;
use crate::{QuizError, Session, SessionInfo};

/// Sent by an actor when its room has been empty for the grace period.
#[derive(Debug, Clone)]
pub(crate) struct EvictionRequest {
    pub code: RoomCode,
    pub id: SessionId,
}

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Join {
        outbox: Outbox,
        name: String,
        reply: oneshot::Sender<Result<String, QuizError>>,
    },
    Leave {
        conn: ConnectionId,
        reply: oneshot::Sender<Option<String>>,
    },
    Start {
        reply: oneshot::Sender<Result<(), QuizError>>,
    },
    Advance {
        reply: oneshot::Sender<Result<(), QuizError>>,
    },
    Submit {
        conn: ConnectionId,
        choice: usize,
        reply: oneshot::Sender<Result<(), QuizError>>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    /// Tell everyone why, then stop.
    Terminate { reason: String },
    /// Stop without notifying anyone.
    Shutdown,
}

/// Handle to a running session actor.
///
/// Cheap to clone. Every method fails with [`QuizError::Unavailable`] once
/// the actor has stopped.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    code: RoomCode,
    id: SessionId,
    host: ConnectionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The room code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// The registry generation of this session.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The host's connection.
    pub fn host(&self) -> ConnectionId {
        self.host
    }

    /// Whether the actor is still running.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Adds a player; returns the trimmed name.
    pub async fn join(
        &self,
        outbox: Outbox,
        name: String,
    ) -> Result<String, QuizError> {
        self.request(|reply| SessionCommand::Join {
            outbox,
            name,
            reply,
        })
        .await?
    }

    /// Removes a player; returns their name if they were present.
    pub async fn leave(
        &self,
        conn: ConnectionId,
    ) -> Result<Option<String>, QuizError> {
        self.request(|reply| SessionCommand::Leave { conn, reply })
            .await
    }

    /// Host's "start".
    pub async fn start(&self) -> Result<(), QuizError> {
        self.request(|reply| SessionCommand::Start { reply }).await?
    }

    /// Host's "next question".
    pub async fn advance(&self) -> Result<(), QuizError> {
        self.request(|reply| SessionCommand::Advance { reply })
            .await?
    }

    /// A player's answer.
    pub async fn submit(
        &self,
        conn: ConnectionId,
        choice: usize,
    ) -> Result<(), QuizError> {
        self.request(|reply| SessionCommand::Submit {
            conn,
            choice,
            reply,
        })
        .await?
    }

    /// Requests a metadata snapshot.
    pub async fn info(&self) -> Result<SessionInfo, QuizError> {
        self.request(|reply| SessionCommand::Info { reply }).await
    }

    /// Ends the session, sending `gameEnded { reason }` to its members.
    pub async fn terminate(&self, reason: impl Into<String>) {
        let _ = self
            .sender
            .send(SessionCommand::Terminate {
                reason: reason.into(),
            })
            .await;
    }

    /// Stops the session silently.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SessionCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, QuizError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| QuizError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| QuizError::Unavailable(self.code.clone()))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor {
    id: SessionId,
    session: Session,
    receiver: mpsc::Receiver<SessionCommand>,
    evictions: mpsc::UnboundedSender<EvictionRequest>,
}

impl SessionActor {
    /// Runs until terminated, shut down, or every handle is dropped.
    async fn run(mut self) {
        let code = self.session.code().clone();
        tracing::info!(%code, id = %self.id, "session actor started");

        loop {
            let deadline = self.session.next_wakeup();
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                () = quizforge_timer::wait_until(deadline) => {
                    if self.session.on_wakeup(Instant::now())
                        == Wakeup::EmptyGraceExpired
                    {
                        tracing::debug!(%code, "empty grace expired, asking for eviction");
                        let _ = self.evictions.send(EvictionRequest {
                            code: code.clone(),
                            id: self.id,
                        });
                    }
                }
            }
        }

        self.session.cancel_timers();
        tracing::info!(%code, id = %self.id, "session actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: SessionCommand) -> bool {
        let now = Instant::now();
        match cmd {
            SessionCommand::Join {
                outbox,
                name,
                reply,
            } => {
                let _ = reply.send(self.session.add_player(outbox, &name));
            }
            SessionCommand::Leave { conn, reply } => {
                let _ = reply.send(self.session.remove_player(conn, now));
            }
            SessionCommand::Start { reply } => {
                let _ = reply.send(self.session.start(now));
            }
            SessionCommand::Advance { reply } => {
                let _ = reply.send(self.session.advance(now));
            }
            SessionCommand::Submit {
                conn,
                choice,
                reply,
            } => {
                let _ =
                    reply.send(self.session.submit_answer(conn, choice, now));
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.session.info());
            }
            SessionCommand::Terminate { reason } => {
                self.session.terminate(&reason);
                return false;
            }
            SessionCommand::Shutdown => {
                tracing::info!(code = %self.session.code(), "session shutting down");
                return false;
            }
        }
        true
    }
}

/// Spawns a session actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_session(
    id: SessionId,
    session: Session,
    channel_size: usize,
    evictions: mpsc::UnboundedSender<EvictionRequest>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let handle = SessionHandle {
        code: session.code().clone(),
        id,
        host: session.host_id(),
        sender: tx,
    };

    let actor = SessionActor {
        id,
        session,
        receiver: rx,
        evictions,
    };
    tokio::spawn(actor.run());

    handle
}
