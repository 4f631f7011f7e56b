use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Information about a sweep that just came due.
#[derive(Debug, Clone)]
pub struct SweepInfo {
    /// Monotonically increasing sweep number (starts at 1).
    pub sweep: u64,
    /// How late the sweep fired relative to its schedule.
    pub late_by: Duration,
    /// How many whole periods were skipped because the loop fell behind.
    pub periods_skipped: u64,
}

/// Fixed-period scheduler for the registry's maintenance sweep.
///
/// A zero period disables sweeping: [`wait_for_sweep`](Self::wait_for_sweep)
/// then pends forever. When the loop falls behind, missed periods are
/// skipped and the next sweep is scheduled from now, never bunched up.
#[derive(Debug)]
pub struct SweepScheduler {
    period: Option<Duration>,
    next: Option<Instant>,
    sweeps: u64,
}

impl SweepScheduler {
    /// Creates a scheduler whose first sweep is one `period` from now.
    pub fn new(period: Duration) -> Self {
        let period = (!period.is_zero()).then_some(period);
        match period {
            Some(p) => debug!(period_secs = p.as_secs(), "sweep scheduler created"),
            None => debug!("sweep scheduler created with sweeping disabled"),
        }
        Self {
            period,
            next: period.map(|p| Instant::now() + p),
            sweeps: 0,
        }
    }

    /// Waits until the next sweep is due.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        let (next, period) = match (self.next, self.period) {
            (Some(next), Some(period)) => (next, period),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.sweeps += 1;

        let late_by = now.saturating_duration_since(next);
        let periods_skipped =
            (late_by.as_nanos() / period.as_nanos()) as u64;
        if periods_skipped > 0 {
            warn!(
                sweep = self.sweeps,
                skipped = periods_skipped,
                late_secs = late_by.as_secs_f64(),
                "sweep overrun, skipping ahead"
            );
        }
        self.next = Some(now + period);

        trace!(sweep = self.sweeps, "sweep due");

        SweepInfo {
            sweep: self.sweeps,
            late_by,
            periods_skipped,
        }
    }
}
