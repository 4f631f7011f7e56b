//! Timers for Quizforge.
//!
//! Two kinds of time-driven work exist in a quiz server:
//!
//! - **Per-session deadlines.** A running question times out, the final
//!   leaderboard turns into `gameOver`, an empty room's grace period runs
//!   out. Each session owns one [`Alarm`] and never has more than one
//!   pending deadline of its own, so re-arming simply replaces the old one
//!   and nothing can fire late against a state it no longer belongs to.
//! - **The periodic sweep.** The registry walks every room at a fixed
//!   period to evict stale ones. [`SweepScheduler`] drives that loop.
//!
//! Both are designed to sit inside an actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     let deadline = alarm.deadline();
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         () = quizforge_timer::wait_until(deadline) => {
//!             if let Some(kind) = alarm.take_due(Instant::now()) { /* fire */ }
//!         }
//!     }
//! }
//! ```
//!
//! All instants are [`tokio::time::Instant`], so tests can drive them with
//! `tokio::time::pause()` and `advance()`.

mod alarm;
mod sweep;

pub use alarm::{Alarm, wait_until};
pub use sweep::{SweepInfo, SweepScheduler};
