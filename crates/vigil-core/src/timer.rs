use std::time::{Duration, Instant};

/// Elapsed-time gate anchored at a start instant.
///
/// Every query has an `_at` form taking the current instant explicitly; the
/// plain forms read the wall clock. The session loop always uses the `_at`
/// forms with the frame's capture instant so one frame sees one "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTimer {
    start_time: Instant,
    duration: Duration,
}

impl CountdownTimer {
    /// Start a timer at the current wall-clock instant.
    pub fn start(duration: Duration) -> Self {
        Self::start_at(Instant::now(), duration)
    }

    pub fn start_at(now: Instant, duration: Duration) -> Self {
        Self {
            start_time: now,
            duration,
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    /// True once `now - start_time >= duration`.
    pub fn expired_at(&self, now: Instant) -> bool {
        self.elapsed_at(now) >= self.duration
    }

    pub fn expired(&self) -> bool {
        self.expired_at(Instant::now())
    }

    /// Time left before expiry, clamped at zero.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.duration.saturating_sub(self.elapsed_at(now))
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    /// Restart the window from `now`, keeping the duration.
    pub fn reset_at(&mut self, now: Instant) {
        self.start_time = now;
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }
}

/// Convert a configured number of seconds into a [`Duration`].
///
/// Negative and NaN values collapse to zero and values too large for a
/// `Duration` saturate; configuration validation rejects both before they
/// reach a timer.
pub fn secs(value: f64) -> Duration {
    match try_secs(value) {
        Some(d) => d,
        None if value > 0.0 => Duration::MAX,
        None => Duration::ZERO,
    }
}

/// Like [`secs`], but `None` for anything that is not a representable
/// non-negative number of seconds.
pub fn try_secs(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}
