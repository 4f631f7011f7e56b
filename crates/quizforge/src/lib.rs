//! # Quizforge
//!
//! Realtime multiplayer quiz server.
//!
//! One connection hosts a room and drives it; others join with the room's
//! six-digit code, answer timed multiple-choice questions, and watch the
//! leaderboard update live. Everything lives in memory.
//!
//! ## Layers
//!
//! ```text
//! Transport (WebSocket frames)
//!     ↓
//! Protocol  (ClientMessage / ServerMessage, JSON)
//!     ↓
//! Router    (roles via the connection directory)
//!     ↓
//! Sessions  (one actor per room, owned by the registry)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizforge::prelude::*;
//!
//! # async fn run() -> Result<(), QuizforgeError> {
//! let server = QuizServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

mod error;
mod handler;
pub mod router;
mod server;

pub use error::QuizforgeError;
pub use router::Router;
pub use server::{QuizServer, QuizServerBuilder, ServerConfig};

/// Everything needed to embed or test a Quizforge server.
pub mod prelude {
    pub use crate::router::{HOST_LEFT, SERVER_RESTARTING};
    pub use crate::{
        QuizServer, QuizServerBuilder, QuizforgeError, Router, ServerConfig,
    };
    pub use quizforge_directory::{Outbound, Outbox, Role};
    pub use quizforge_protocol::{
        ClientMessage, Codec, JsonCodec, LeaderboardEntry, QuestionPayload,
        RoomCode, ServerMessage,
    };
    pub use quizforge_session::{
        EvictReason, Question, QuestionBank, QuizConfig, QuizError,
        SessionRegistry, SessionState,
    };
    pub use quizforge_transport::ConnectionId;
}
