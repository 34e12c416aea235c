use std::time::{Duration, Instant};

/// The single repeating timer that drives snapshot refreshes.
///
/// The timer is polled from the event loop rather than running on its own
/// thread; `poll` reports whether a tick is due and re-arms for the next one.
/// An interval of zero means "paused" and never arms.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    interval: Duration,
    next_due: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer; returns false when `interval` is the paused sentinel
    pub fn start(&mut self, interval: Duration, now: Instant) -> bool {
        self.next_due = None;
        self.interval = interval;
        if interval.is_zero() {
            return false;
        }
        self.next_due = Some(now + interval);
        true
    }

    /// Cancel the pending tick and arm a new one at `interval`
    pub fn reconfigure(&mut self, interval: Duration, now: Instant) -> bool {
        self.stop();
        self.start(interval, now)
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Number of ticks waiting to fire (never more than one)
    pub fn pending_ticks(&self) -> usize {
        usize::from(self.next_due.is_some())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left until the next tick, if armed
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Returns true once per elapsed interval
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        // Missed ticks collapse into one; the next tick is measured from now
        let next = due + self.interval;
        self.next_due = Some(if next <= now { now + self.interval } else { next });
        true
    }
}
