//! Session registry: creates sessions, finds them by code, evicts stale
//! ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use quizforge_directory::Outbox;
use quizforge_protocol::RoomCode;
use quizforge_timer::SweepScheduler;
use quizforge_transport::ConnectionId;
use rand::Rng;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::Instant;

use crate::actor::{EvictionRequest, spawn_session};
use crate::{
    QuestionBank, QuizConfig, QuizError, Session, SessionHandle, SessionId,
    SessionInfo,
};

/// Upper bound on rejection-sampling rounds for a fresh room code.
const MAX_CODE_ATTEMPTS: usize = 10_000;

// ---------------------------------------------------------------------------
// Room codes
// ---------------------------------------------------------------------------

/// Produces candidate room codes. The registry rejects ones in use.
pub trait CodeSource: Send + 'static {
    fn next_code(&mut self) -> RoomCode;
}

/// Uniformly random six-digit codes in `100000..=999999`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&mut self) -> RoomCode {
        RoomCode::from_number(rand::rng().random_range(100_000..=999_999))
    }
}

// ---------------------------------------------------------------------------
// Eviction policy
// ---------------------------------------------------------------------------

/// Why the registry removed a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// No question started within the maximum session age.
    Stale,
    /// No players and no connected host.
    Abandoned,
    /// No players for the whole empty-room grace period.
    EmptyTooLong,
}

impl EvictReason {
    /// Decides whether a session should be swept at `now`.
    ///
    /// A session that never started a question ages from its creation.
    pub fn check(
        info: &SessionInfo,
        config: &QuizConfig,
        now: Instant,
    ) -> Option<Self> {
        if now.saturating_duration_since(info.last_activity)
            > config.max_session_age
        {
            return Some(Self::Stale);
        }
        if info.player_count == 0 && !info.host_connected {
            return Some(Self::Abandoned);
        }
        match info.empty_since {
            Some(since)
                if info.player_count == 0
                    && now.saturating_duration_since(since)
                        >= config.empty_grace =>
            {
                Some(Self::EmptyTooLong)
            }
            _ => None,
        }
    }

    /// What remaining members are told in `gameEnded`.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Stale => "the game was closed after being inactive for too long",
            Self::Abandoned => "the game was abandoned",
            Self::EmptyTooLong => "the room was empty for too long",
        }
    }
}

impl fmt::Display for EvictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => write!(f, "stale"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::EmptyTooLong => write!(f, "empty"),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owns every live session.
///
/// Cheap to clone; clones share the same sessions. All reads and writes of
/// the code → session map go through one async mutex. The lock is never
/// held while waiting on a session actor.
///
/// Creating a registry spawns its maintenance task (periodic sweep plus
/// eager empty-room eviction), so it must be created inside a Tokio
/// runtime. The task stops on [`shutdown_all`](Self::shutdown_all) or when
/// the last clone is dropped.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: Mutex<HashMap<RoomCode, SessionHandle>>,
    codes: std::sync::Mutex<Box<dyn CodeSource>>,
    bank: QuestionBank,
    config: QuizConfig,
    next_id: AtomicU64,
    evictions: mpsc::UnboundedSender<EvictionRequest>,
    stop: watch::Sender<bool>,
}

impl SessionRegistry {
    /// Creates a registry with random room codes.
    pub fn new(config: QuizConfig, bank: QuestionBank) -> Self {
        Self::with_code_source(config, bank, RandomCodes)
    }

    /// Creates a registry that draws room codes from `codes`.
    pub fn with_code_source(
        config: QuizConfig,
        bank: QuestionBank,
        codes: impl CodeSource,
    ) -> Self {
        let config = config.validated();
        let (evict_tx, evict_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let sweep_interval = config.sweep_interval;

        let inner = Arc::new(Inner {
            sessions: Mutex::new(HashMap::new()),
            codes: std::sync::Mutex::new(Box::new(codes)),
            bank,
            config,
            next_id: AtomicU64::new(1),
            evictions: evict_tx,
            stop: stop_tx,
        });

        tokio::spawn(maintain(
            Arc::downgrade(&inner),
            evict_rx,
            stop_rx,
            sweep_interval,
        ));

        Self { inner }
    }

    /// The effective (validated) configuration.
    pub fn config(&self) -> &QuizConfig {
        &self.inner.config
    }

    /// Opens a new session hosted by `host` under a fresh code.
    ///
    /// # Errors
    /// [`QuizError::NoFreeCode`] if no unused code turned up.
    pub async fn create(
        &self,
        host: Outbox,
    ) -> Result<SessionHandle, QuizError> {
        let mut sessions = self.inner.sessions.lock().await;
        let code = self.fresh_code(&sessions)?;
        let id = SessionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let questions = self.inner.bank.draw(self.inner.config.questions_per_game);

        let session = Session::new(
            code.clone(),
            host,
            questions,
            &self.inner.config,
            Instant::now(),
        );
        let handle = spawn_session(
            id,
            session,
            self.inner.config.command_channel_size,
            self.inner.evictions.clone(),
        );
        sessions.insert(code.clone(), handle.clone());

        tracing::info!(%code, %id, sessions = sessions.len(), "session created");
        Ok(handle)
    }

    fn fresh_code(
        &self,
        live: &HashMap<RoomCode, SessionHandle>,
    ) -> Result<RoomCode, QuizError> {
        let mut codes = self
            .inner
            .codes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = codes.next_code();
            if !live.contains_key(&code) {
                return Ok(code);
            }
        }
        tracing::warn!(live = live.len(), "no free room code found");
        Err(QuizError::NoFreeCode)
    }

    /// Looks up a live session.
    pub async fn get(&self, code: &RoomCode) -> Option<SessionHandle> {
        self.inner.sessions.lock().await.get(code).cloned()
    }

    /// Whether a session with this code is live.
    pub async fn contains(&self, code: &RoomCode) -> bool {
        self.inner.sessions.lock().await.contains_key(code)
    }

    /// Looks up a session or fails with [`QuizError::NotFound`].
    pub async fn require(
        &self,
        code: &RoomCode,
    ) -> Result<SessionHandle, QuizError> {
        self.get(code)
            .await
            .ok_or_else(|| QuizError::NotFound(code.clone()))
    }

    /// Ends the session `code` if `host` is its host.
    ///
    /// Players get `gameEnded { reason }` and the code is free for reuse
    /// as soon as this returns. Returns `false` if there was no such
    /// session (already evicted, or the code now belongs to someone else).
    pub async fn end_hosted(
        &self,
        code: &RoomCode,
        host: ConnectionId,
        reason: &str,
    ) -> bool {
        let Some(handle) = self.take_hosted(code, host).await else {
            return false;
        };
        tracing::info!(%code, "host left, ending session");
        handle.terminate(reason).await;
        true
    }

    /// Like [`end_hosted`](Self::end_hosted) but tells nobody.
    ///
    /// For a host moving on from a game that already ended.
    pub async fn close_hosted(&self, code: &RoomCode, host: ConnectionId) -> bool {
        let Some(handle) = self.take_hosted(code, host).await else {
            return false;
        };
        tracing::info!(%code, "host moved on, closing finished session");
        handle.shutdown().await;
        true
    }

    async fn take_hosted(
        &self,
        code: &RoomCode,
        host: ConnectionId,
    ) -> Option<SessionHandle> {
        let mut sessions = self.inner.sessions.lock().await;
        match sessions.get(code) {
            Some(h) if h.host() == host => sessions.remove(code),
            _ => None,
        }
    }

    /// Runs one sweep at `now`: evicts every session [`EvictReason`]
    /// selects and returns what was removed.
    ///
    /// Sessions whose actor has already stopped are dropped as well.
    pub async fn sweep(&self, now: Instant) -> Vec<(RoomCode, EvictReason)> {
        let handles: Vec<SessionHandle> =
            self.inner.sessions.lock().await.values().cloned().collect();

        let mut doomed = Vec::new();
        let mut dead = Vec::new();
        for handle in handles {
            match handle.info().await {
                Ok(info) => {
                    if let Some(reason) =
                        EvictReason::check(&info, &self.inner.config, now)
                    {
                        doomed.push((handle, reason));
                    }
                }
                Err(_) => dead.push(handle),
            }
        }

        let mut evicted = Vec::new();
        {
            let mut sessions = self.inner.sessions.lock().await;
            for handle in &dead {
                remove_if_same(&mut sessions, handle);
            }
            doomed.retain(|(handle, _)| remove_if_same(&mut sessions, handle));
            tracing::info!(
                evicted = doomed.len(),
                remaining = sessions.len(),
                "sweep finished"
            );
        }

        for (handle, reason) in doomed {
            tracing::info!(code = %handle.code(), %reason, "evicting session");
            handle.terminate(reason.message()).await;
            evicted.push((handle.code().clone(), reason));
        }
        evicted
    }

    async fn evict_if_still_empty(&self, req: EvictionRequest) {
        let Some(handle) = self.get(&req.code).await else {
            return;
        };
        if handle.id() != req.id {
            return;
        }
        let still_empty = match handle.info().await {
            Ok(info) => info.player_count == 0,
            Err(_) => true,
        };
        if !still_empty {
            return;
        }
        let removed = {
            let mut sessions = self.inner.sessions.lock().await;
            remove_if_same(&mut sessions, &handle)
        };
        if removed {
            tracing::info!(code = %req.code, "removing empty session");
            handle
                .terminate(EvictReason::EmptyTooLong.message())
                .await;
        }
    }

    /// Stops every session silently and the maintenance task.
    ///
    /// The caller is responsible for telling clients; see the server's
    /// shutdown path.
    pub async fn shutdown_all(&self) {
        let _ = self.inner.stop.send(true);
        let drained: Vec<SessionHandle> = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.drain().map(|(_, h)| h).collect()
        };
        tracing::info!(sessions = drained.len(), "shutting down all sessions");
        for handle in drained {
            handle.shutdown().await;
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Returns `true` if no session is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.lock().await.is_empty()
    }
}

/// Removes `handle`'s entry only if the map still holds that generation.
fn remove_if_same(
    sessions: &mut HashMap<RoomCode, SessionHandle>,
    handle: &SessionHandle,
) -> bool {
    match sessions.get(handle.code()) {
        Some(current) if current.id() == handle.id() => {
            sessions.remove(handle.code());
            true
        }
        _ => false,
    }
}

/// The registry's maintenance loop.
async fn maintain(
    inner: Weak<Inner>,
    mut evictions: mpsc::UnboundedReceiver<EvictionRequest>,
    mut stop: watch::Receiver<bool>,
    sweep_interval: std::time::Duration,
) {
    let mut sweeps = SweepScheduler::new(sweep_interval);
    loop {
        tokio::select! {
            due = sweeps.wait_for_sweep() => {
                let Some(inner) = inner.upgrade() else { break };
                tracing::debug!(
                    sweep = due.sweep,
                    late_ms = due.late_by.as_millis() as u64,
                    skipped = due.periods_skipped,
                    "periodic sweep due"
                );
                SessionRegistry { inner }.sweep(Instant::now()).await;
            }
            Some(req) = evictions.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                SessionRegistry { inner }.evict_if_still_empty(req).await;
            }
            _ = stop.changed() => break,
        }
    }
    tracing::debug!("registry maintenance stopped");
}
