//! Quiz configuration and the session state machine's states.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// QuizConfig
// ---------------------------------------------------------------------------

/// Timing and sizing knobs shared by every session in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizConfig {
    /// How many questions are drawn from the bank for each game.
    pub questions_per_game: usize,

    /// How long a question stays open. Also the time scale of the
    /// speed bonus: an answer at or past this scores the base 500 points.
    pub question_time: Duration,

    /// How long the final leaderboard is shown before `gameOver`.
    pub final_leaderboard_delay: Duration,

    /// How long a room may sit with zero players before it is evicted.
    pub empty_grace: Duration,

    /// Rooms whose last question started longer ago than this are swept.
    pub max_session_age: Duration,

    /// Period of the registry's maintenance sweep. Zero disables it.
    pub sweep_interval: Duration,

    /// Capacity of each session actor's command channel.
    pub command_channel_size: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            questions_per_game: 10,
            question_time: Duration::from_secs(30),
            final_leaderboard_delay: Duration::from_secs(5),
            empty_grace: Duration::from_secs(5 * 60),
            max_session_age: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(30 * 60),
            command_channel_size: 64,
        }
    }
}

impl QuizConfig {
    /// Shortest question time accepted.
    pub const MIN_QUESTION_TIME: Duration = Duration::from_secs(1);

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called by the registry on construction. Rules:
    /// - `questions_per_game` is at least 1.
    /// - `question_time` is at least [`Self::MIN_QUESTION_TIME`].
    /// - `command_channel_size` is at least 1.
    pub fn validated(mut self) -> Self {
        if self.questions_per_game == 0 {
            warn!("questions_per_game is 0, using 1");
            self.questions_per_game = 1;
        }
        if self.question_time < Self::MIN_QUESTION_TIME {
            warn!(
                question_time_ms = self.question_time.as_millis() as u64,
                "question_time below minimum, clamping"
            );
            self.question_time = Self::MIN_QUESTION_TIME;
        }
        if self.command_channel_size == 0 {
            self.command_channel_size = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its game.
///
/// ```text
///   Lobby ──(start)──→ Question ──(timeout / all answered)──→ Leaderboard
///                         ↑                                       │
///                         └──────────────(advance)────────────────┤
///                                                                 ▼
///                                    (advance past last / delay) Finished
/// ```
///
/// - **Lobby**: accepting players, waiting for the host to start.
/// - **Question**: a question is open and its timer is running.
/// - **Leaderboard**: the last question was scored; waiting for the host.
/// - **Finished**: `gameOver` was sent. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Lobby,
    Question,
    Leaderboard,
    Finished,
}

impl SessionState {
    /// Returns `true` if players may still join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` once the game has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Question => write!(f, "question"),
            Self::Leaderboard => write!(f, "leaderboard"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_config_default() {
        let config = QuizConfig::default();
        assert_eq!(config.questions_per_game, 10);
        assert_eq!(config.question_time, Duration::from_secs(30));
        assert_eq!(config.final_leaderboard_delay, Duration::from_secs(5));
        assert_eq!(config.empty_grace, Duration::from_secs(300));
        assert_eq!(config.max_session_age, Duration::from_secs(7200));
        assert_eq!(config.sweep_interval, Duration::from_secs(1800));
    }

    #[test]
    fn test_validated_clamps_degenerate_values() {
        let config = QuizConfig {
            questions_per_game: 0,
            question_time: Duration::ZERO,
            command_channel_size: 0,
            ..QuizConfig::default()
        }
        .validated();

        assert_eq!(config.questions_per_game, 1);
        assert_eq!(config.question_time, QuizConfig::MIN_QUESTION_TIME);
        assert_eq!(config.command_channel_size, 1);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let config = QuizConfig {
            questions_per_game: 3,
            question_time: Duration::from_secs(20),
            ..QuizConfig::default()
        }
        .validated();

        assert_eq!(config.questions_per_game, 3);
        assert_eq!(config.question_time, Duration::from_secs(20));
    }

    #[test]
    fn test_session_state_is_joinable() {
        assert!(SessionState::Lobby.is_joinable());
        assert!(!SessionState::Question.is_joinable());
        assert!(!SessionState::Leaderboard.is_joinable());
        assert!(!SessionState::Finished.is_joinable());
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Lobby.to_string(), "lobby");
        assert_eq!(SessionState::Leaderboard.to_string(), "leaderboard");
        assert!(SessionState::Finished.is_terminal());
    }
}
