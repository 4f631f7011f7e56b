//! Quiz sessions for Quizforge.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`Session`]: players, scores, the question sequence and the one timer
//! that may be pending.
//!
//! # Key types
//!
//! - [`Session`]: the pure state machine (lobby → question → leaderboard
//!   → finished) with the scoring rules
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`SessionRegistry`]: creates sessions under unique room codes, finds
//!   them, and sweeps out stale or empty ones
//! - [`QuestionBank`]: the pool each game draws its questions from
//! - [`QuizConfig`]: timings and sizes

mod actor;
mod bank;
mod config;
mod error;
mod registry;
pub mod scoring;
mod session;

pub use quizforge_directory::SessionId;

pub use actor::SessionHandle;
pub use bank::{BankError, Question, QuestionBank};
pub use config::{QuizConfig, SessionState};
pub use error::{ErrorKind, QuizError};
pub use registry::{CodeSource, EvictReason, RandomCodes, SessionRegistry};
pub use session::{Session, SessionInfo, Wakeup};
