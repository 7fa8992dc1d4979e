//! Debouncing of per-frame detector signals.
//!
//! Detectors flicker: a face detector may drop a face for one frame, a gaze
//! classifier may misread a blink. A [`Debouncer`] only reports a violation
//! once the adverse condition has held on every polled frame for a full
//! window. Any frame where the condition is false restarts the count.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::timer::CountdownTimer;

/// What a debouncer does after it fires while the condition is still true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatPolicy {
    /// Start a fresh window at the firing instant. A condition that stays
    /// adverse fires once per window.
    #[default]
    #[serde(alias = "restart-immediately")]
    Restart,
    /// Stay quiet until the condition goes false at least once.
    RequireClear,
}

/// Outcome of polling a debouncer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Condition is false; nothing pending.
    Idle,
    /// Condition is true but the window has not elapsed.
    Pending,
    /// Condition held for the whole window; count a violation.
    Fired,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    policy: RepeatPolicy,
    pending_since: Option<CountdownTimer>,
    latched: bool,
}

impl Debouncer {
    pub fn new(window: Duration, policy: RepeatPolicy) -> Self {
        Self {
            window,
            policy,
            pending_since: None,
            latched: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed this frame's condition (`true` = adverse).
    pub fn poll(&mut self, condition: bool, now: Instant) -> DebounceState {
        if !condition {
            self.clear();
            return DebounceState::Idle;
        }

        if self.latched {
            return DebounceState::Pending;
        }

        let timer = *self
            .pending_since
            .get_or_insert_with(|| CountdownTimer::start_at(now, self.window));

        if !timer.expired_at(now) {
            return DebounceState::Pending;
        }

        match self.policy {
            RepeatPolicy::Restart => {
                self.pending_since = Some(CountdownTimer::start_at(now, self.window));
            }
            RepeatPolicy::RequireClear => {
                self.pending_since = None;
                self.latched = true;
            }
        }
        DebounceState::Fired
    }

    /// Drop any pending window without firing.
    pub fn clear(&mut self) {
        self.pending_since = None;
        self.latched = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some() || self.latched
    }

    /// Time until the pending window fires, if one is running.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.pending_since.map(|t| t.remaining_at(now))
    }
}
