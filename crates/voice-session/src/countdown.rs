//! Call duration countdown
//!
//! [`Countdown`] is the pure part of the call timer: it knows when the call started, how much time
//! is left and whether the warning was already shown. The session drives it from a one-second
//! ticker task and acts on the returned [`TickReport`].
//!
//! Times are `tokio::time::Instant`s so paused-clock tests control the countdown.

use std::time::Duration;

use tokio::time::Instant;

/// Interval between countdown ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Result of a single tick on an armed countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Time left after this tick
    pub remaining: Duration,
    /// This is the first tick inside the warning threshold
    pub warn: bool,
    /// No time is left; the call must be ended
    pub expired: bool,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    max_duration: Duration,
    warning_threshold: Duration,
    started_at: Option<Instant>,
    remaining: Option<Duration>,
    warning_shown: bool,
}

impl Countdown {
    pub fn new(max_duration: Duration, warning_threshold: Duration) -> Self {
        Self {
            max_duration,
            warning_threshold,
            started_at: None,
            remaining: None,
            warning_shown: false,
        }
    }

    /// Start counting down from the full duration
    pub fn arm(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.remaining = Some(self.max_duration);
        self.warning_shown = false;
    }

    /// Recompute the remaining time.
    ///
    /// Returns `None` when the countdown is not armed, which is how a tick that fires after
    /// teardown is recognised and ignored.
    pub fn tick(&mut self, now: Instant) -> Option<TickReport> {
        let started_at = self.started_at?;
        let elapsed = now.saturating_duration_since(started_at);
        let remaining = self.max_duration.saturating_sub(elapsed);
        self.remaining = Some(remaining);

        let warn = !self.warning_shown && remaining <= self.warning_threshold;
        if warn {
            self.warning_shown = true;
        }

        Some(TickReport {
            remaining,
            warn,
            expired: remaining.is_zero(),
        })
    }

    /// Stop counting; safe to call any number of times
    pub fn disarm(&mut self) {
        self.started_at = None;
        self.remaining = None;
        self.warning_shown = false;
    }

    pub fn is_armed(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time left; `None` exactly when not armed
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    pub fn warning_shown(&self) -> bool {
        self.warning_shown
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn warning_threshold(&self) -> Duration {
        self.warning_threshold
    }

    /// Remaining time as `MM:SS`
    pub fn format_remaining(&self) -> Option<String> {
        self.remaining.map(format_mm_ss)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Render a duration as `MM:SS`, rounding partial seconds up
pub fn format_mm_ss(duration: Duration) -> String {
    let millis = duration.as_millis();
    let total_secs = (millis + 999) / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
