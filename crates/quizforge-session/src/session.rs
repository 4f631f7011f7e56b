//! The per-room quiz state machine.
//!
//! [`Session`] is plain data plus methods: it never spawns, sleeps or
//! locks. Every method that depends on time takes `now` explicitly, and
//! the one pending deadline it may have is exposed through
//! [`Session::next_wakeup`] for its actor to sleep on. That keeps all the
//! game rules testable without a runtime.
//!
//! Messages to clients go straight to their [`Outbox`]es, so they are
//! queued in exactly the order the state machine produces them.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use quizforge_directory::Outbox;
use quizforge_protocol::{LeaderboardEntry, RoomCode, ServerMessage};
use quizforge_timer::Alarm;
use quizforge_transport::ConnectionId;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::scoring::{points_for, rank};
use crate::{Question, QuizConfig, QuizError, SessionState};

/// What the session's alarm is armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// The open question's time is up.
    QuestionTimeout,
    /// The final leaderboard has been shown long enough.
    FinishGame,
}

/// What happened when the actor woke the session up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// Nothing the actor needs to act on.
    Idle,
    /// The room has been empty for the whole grace period.
    EmptyGraceExpired,
}

#[derive(Debug)]
struct Player {
    conn: ConnectionId,
    name: String,
    score: u32,
    outbox: Outbox,
}

#[derive(Debug, Clone, Copy)]
struct PendingAnswer {
    choice: usize,
    received_at: Instant,
}

/// A snapshot of session metadata, used by the registry's sweep.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub code: RoomCode,
    pub state: SessionState,
    pub player_count: usize,
    pub host_connected: bool,
    /// When the last question started, or when the session was created
    /// if no question has started yet.
    pub last_activity: Instant,
    /// Since when the room has had no players, if it is empty after
    /// someone left.
    pub empty_since: Option<Instant>,
}

/// One quiz room.
#[derive(Debug)]
pub struct Session {
    code: RoomCode,
    host: Outbox,
    /// Join order.
    players: Vec<Player>,
    state: SessionState,
    questions: Vec<Question>,
    current: usize,
    pending: HashMap<ConnectionId, PendingAnswer>,
    question_started_at: Option<Instant>,
    created_at: Instant,
    empty_since: Option<Instant>,
    eviction_requested: bool,
    alarm: Alarm<Deadline>,
    question_time: Duration,
    final_leaderboard_delay: Duration,
    empty_grace: Duration,
}

impl Session {
    /// Opens a room in the lobby with a fixed question sequence.
    pub fn new(
        code: RoomCode,
        host: Outbox,
        questions: Vec<Question>,
        config: &QuizConfig,
        now: Instant,
    ) -> Self {
        Self {
            code,
            host,
            players: Vec::new(),
            state: SessionState::Lobby,
            questions,
            current: 0,
            pending: HashMap::new(),
            question_started_at: None,
            created_at: now,
            empty_since: None,
            eviction_requested: false,
            alarm: Alarm::new(),
            question_time: config.question_time,
            final_leaderboard_delay: config.final_leaderboard_delay,
            empty_grace: config.empty_grace,
        }
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Adds a player. Returns the trimmed name they joined under.
    ///
    /// On success the joiner gets `joinSuccess` and the host gets the new
    /// roster. On failure nothing changes.
    ///
    /// # Errors
    /// - [`QuizError::Validation`] if the name is blank or the connection
    ///   is already in this room.
    /// - [`QuizError::AlreadyStarted`] outside the lobby.
    /// - [`QuizError::NameTaken`] if the name is in use (case-sensitive).
    pub fn add_player(
        &mut self,
        outbox: Outbox,
        name: &str,
    ) -> Result<String, QuizError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QuizError::Validation("a name is required".into()));
        }
        if !self.state.is_joinable() {
            return Err(QuizError::AlreadyStarted);
        }
        if self.players.iter().any(|p| p.conn == outbox.id()) {
            return Err(QuizError::Validation(
                "this connection already joined".into(),
            ));
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(QuizError::NameTaken(name.to_string()));
        }

        outbox.send(ServerMessage::JoinSuccess {
            name: name.to_string(),
        });
        self.players.push(Player {
            conn: outbox.id(),
            name: name.to_string(),
            score: 0,
            outbox,
        });
        self.empty_since = None;
        self.eviction_requested = false;

        info!(code = %self.code, name, players = self.players.len(), "player joined");
        self.send_roster();
        Ok(name.to_string())
    }

    /// Removes a player. Idempotent; returns the name if they were here.
    ///
    /// The host gets the new roster. If the last player left, the empty
    /// grace period starts. If everyone still here has already answered
    /// the open question, it is scored now.
    pub fn remove_player(
        &mut self,
        conn: ConnectionId,
        now: Instant,
    ) -> Option<String> {
        let index = self.players.iter().position(|p| p.conn == conn)?;
        let player = self.players.remove(index);
        self.pending.remove(&conn);

        info!(
            code = %self.code,
            name = %player.name,
            players = self.players.len(),
            "player left"
        );
        self.send_roster();

        if self.players.is_empty() {
            self.empty_since = Some(now);
            self.eviction_requested = false;
        } else if self.state == SessionState::Question && self.all_answered() {
            self.alarm.disarm();
            self.score_question(now);
        }

        Some(player.name)
    }

    // -----------------------------------------------------------------
    // Game flow
    // -----------------------------------------------------------------

    /// Host's "start": leaves the lobby and opens question 1.
    ///
    /// A leaderboard of all-zero scores goes out first so every client
    /// switches to its game view, then the first question follows.
    ///
    /// # Errors
    /// - [`QuizError::InvalidState`] outside the lobby.
    /// - [`QuizError::EmptyRoom`] with no players.
    pub fn start(&mut self, now: Instant) -> Result<(), QuizError> {
        if self.state != SessionState::Lobby {
            return Err(self.invalid("start the game"));
        }
        if self.players.is_empty() {
            return Err(QuizError::EmptyRoom);
        }

        self.current = 0;
        self.state = SessionState::Question;
        info!(
            code = %self.code,
            players = self.players.len(),
            questions = self.questions.len(),
            "game started"
        );
        self.broadcast_leaderboard(false);
        self.dispatch_question(now);
        Ok(())
    }

    /// Host's "next": opens the next question, or ends the game if none
    /// are left.
    ///
    /// A "next" while question 1 is open does nothing: hosts press it on
    /// the zero-score leaderboard that [`start`](Self::start) sends.
    ///
    /// # Errors
    /// [`QuizError::InvalidState`] unless a leaderboard is showing.
    pub fn advance(&mut self, now: Instant) -> Result<(), QuizError> {
        if self.state == SessionState::Question && self.current == 0 {
            debug!(code = %self.code, "next during the first question ignored");
            return Ok(());
        }
        if self.state != SessionState::Leaderboard {
            return Err(self.invalid("move to the next question"));
        }
        self.dispatch_question(now);
        Ok(())
    }

    /// Records a player's answer to the open question.
    ///
    /// Once every player present has answered, the question timer is
    /// cancelled and the question is scored immediately.
    ///
    /// # Errors
    /// - [`QuizError::InvalidState`] if no question is open.
    /// - [`QuizError::NotAPlayer`] if `conn` isn't in this room.
    /// - [`QuizError::AlreadySubmitted`] on a second answer.
    pub fn submit_answer(
        &mut self,
        conn: ConnectionId,
        choice: usize,
        now: Instant,
    ) -> Result<(), QuizError> {
        if self.state != SessionState::Question {
            return Err(self.invalid("submit an answer"));
        }
        if !self.players.iter().any(|p| p.conn == conn) {
            return Err(QuizError::NotAPlayer);
        }
        if self.pending.contains_key(&conn) {
            return Err(QuizError::AlreadySubmitted);
        }

        self.pending.insert(
            conn,
            PendingAnswer {
                choice,
                received_at: now,
            },
        );
        debug!(
            code = %self.code,
            %conn,
            answered = self.pending.len(),
            players = self.players.len(),
            "answer recorded"
        );

        if self.all_answered() {
            self.alarm.disarm();
            self.score_question(now);
        }
        Ok(())
    }

    /// Ends the room early, telling everyone why.
    ///
    /// Cancels any pending deadline. The session is finished afterwards.
    pub fn terminate(&mut self, reason: &str) {
        self.alarm.disarm();
        self.state = SessionState::Finished;
        let msg = ServerMessage::GameEnded {
            reason: reason.to_string(),
        };
        self.host.send(msg.clone());
        for p in &self.players {
            p.outbox.send(msg.clone());
        }
        info!(code = %self.code, reason, "session terminated");
    }

    /// Cancels any pending deadline without notifying anyone.
    pub fn cancel_timers(&mut self) {
        self.alarm.disarm();
        self.eviction_requested = true;
    }

    // -----------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------

    /// The next instant the actor should wake this session at.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let grace = self.grace_deadline();
        match (self.alarm.deadline(), grace) {
            (Some(a), Some(g)) => Some(a.min(g)),
            (a, g) => a.or(g),
        }
    }

    /// Fires whatever is due at `now`.
    pub fn on_wakeup(&mut self, now: Instant) -> Wakeup {
        match self.alarm.take_due(now) {
            Some(Deadline::QuestionTimeout)
                if self.state == SessionState::Question =>
            {
                debug!(code = %self.code, "question timed out");
                self.score_question(now);
            }
            Some(Deadline::FinishGame)
                if self.state == SessionState::Leaderboard =>
            {
                self.end_game();
            }
            _ => {}
        }

        match self.grace_deadline() {
            Some(at) if at <= now => {
                self.eviction_requested = true;
                Wakeup::EmptyGraceExpired
            }
            _ => Wakeup::Idle,
        }
    }

    fn grace_deadline(&self) -> Option<Instant> {
        if self.eviction_requested || !self.players.is_empty() {
            return None;
        }
        self.empty_since.map(|since| since + self.empty_grace)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Player names in join order.
    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// Current standings, highest first, ties in join order.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        rank(self.players.iter().map(|p| (p.name.as_str(), p.score)))
    }

    /// The connection that hosts this room.
    pub fn host_id(&self) -> ConnectionId {
        self.host.id()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            code: self.code.clone(),
            state: self.state,
            player_count: self.players.len(),
            host_connected: self.host.is_open(),
            last_activity: self.question_started_at.unwrap_or(self.created_at),
            empty_since: self.empty_since,
        }
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn all_answered(&self) -> bool {
        !self.players.is_empty() && self.pending.len() >= self.players.len()
    }

    fn dispatch_question(&mut self, now: Instant) {
        let Some(question) = self.questions.get(self.current) else {
            self.end_game();
            return;
        };

        self.state = SessionState::Question;
        self.pending.clear();
        self.question_started_at = Some(now);
        let start_time = epoch_millis();

        self.host.send(ServerMessage::NewQuestion {
            question: question.to_payload(true),
            q_num: Some(self.current + 1),
            total: Some(self.questions.len()),
            start_time,
        });
        let for_players = ServerMessage::NewQuestion {
            question: question.to_payload(false),
            q_num: None,
            total: None,
            start_time,
        };
        for p in &self.players {
            p.outbox.send(for_players.clone());
        }

        self.alarm
            .arm(now + self.question_time, Deadline::QuestionTimeout);
        info!(
            code = %self.code,
            question = self.current + 1,
            total = self.questions.len(),
            "question opened"
        );
    }

    fn score_question(&mut self, now: Instant) {
        self.alarm.disarm();
        let Some(question) = self.questions.get(self.current) else {
            return;
        };
        let started = self.question_started_at.unwrap_or(now);

        for p in &mut self.players {
            let Some(answer) = self.pending.get(&p.conn) else {
                continue;
            };
            let correct = answer.choice == question.correct;
            let elapsed = answer.received_at.saturating_duration_since(started);
            let points = points_for(correct, elapsed, self.question_time);
            p.score = p.score.saturating_add(points);
            p.outbox.send(ServerMessage::AnswerResult {
                correct,
                score: p.score,
                points,
            });
        }

        self.current += 1;
        self.state = SessionState::Leaderboard;
        let is_last = self.current >= self.questions.len();
        debug!(
            code = %self.code,
            question = self.current,
            answered = self.pending.len(),
            is_last,
            "question scored"
        );
        self.broadcast_leaderboard(is_last);

        if is_last {
            self.alarm
                .arm(now + self.final_leaderboard_delay, Deadline::FinishGame);
        }
    }

    fn end_game(&mut self) {
        self.alarm.disarm();
        self.state = SessionState::Finished;
        let msg = ServerMessage::GameOver {
            leaderboard: self.leaderboard(),
        };
        self.broadcast(&msg);
        info!(code = %self.code, "game over");
    }

    fn broadcast_leaderboard(&self, is_last_question: bool) {
        self.broadcast(&ServerMessage::LeaderboardUpdate {
            leaderboard: self.leaderboard(),
            is_last_question,
        });
    }

    fn send_roster(&self) {
        self.host.send(ServerMessage::UpdatePlayers {
            players: self.player_names(),
        });
    }

    /// Host first, then players in join order.
    fn broadcast(&self, msg: &ServerMessage) {
        self.host.send(msg.clone());
        for p in &self.players {
            p.outbox.send(msg.clone());
        }
    }

    fn invalid(&self, operation: &'static str) -> QuizError {
        QuizError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
