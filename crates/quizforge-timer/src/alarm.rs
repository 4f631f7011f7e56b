use tokio::time::{self, Instant};
use tracing::trace;

/// A single pending deadline tagged with what it is for.
///
/// `K` is the caller's own "what happens when this fires" enum. Arming an
/// alarm that is already armed replaces the previous deadline.
#[derive(Debug, Clone)]
pub struct Alarm<K> {
    pending: Option<(Instant, K)>,
}

impl<K> Default for Alarm<K> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<K: Copy + std::fmt::Debug> Alarm<K> {
    /// Creates an unarmed alarm.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the alarm to fire at `at`, replacing any earlier deadline.
    pub fn arm(&mut self, at: Instant, kind: K) {
        if let Some((_, old)) = self.pending {
            trace!(?old, new = ?kind, "alarm re-armed");
        }
        self.pending = Some((at, kind));
    }

    /// Cancels the pending deadline, if any.
    pub fn disarm(&mut self) {
        self.pending = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// When the alarm will fire, or `None` if unarmed.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(at, _)| at)
    }

    /// What the alarm is armed for, or `None` if unarmed.
    pub fn kind(&self) -> Option<K> {
        self.pending.map(|(_, kind)| kind)
    }

    /// If the deadline has passed at `now`, disarms and returns its kind.
    ///
    /// Returns `None` (and leaves the alarm armed) if it isn't due yet.
    pub fn take_due(&mut self, now: Instant) -> Option<K> {
        match self.pending {
            Some((at, kind)) if at <= now => {
                self.pending = None;
                Some(kind)
            }
            _ => None,
        }
    }
}

/// Sleeps until `deadline`, or forever if there is none.
///
/// In a `tokio::select!` the "forever" branch simply never wins, which is
/// what an idle session wants.
pub async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
