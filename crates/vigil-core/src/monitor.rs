//! Per-frame violation state machine.
//!
//! Checks run in strict priority order and each branch short-circuits the
//! ones below it for that frame:
//!
//! 1. no face in view
//! 2. more than one face in view
//! 3. exactly one face: distance, then (optionally) phone, then head
//!    alignment, then eye gaze
//!
//! Head and eye checks are additionally gated by a global grace window that
//! opens after every counted violation, and eye gaze is only evaluated once
//! the head has been continuously straight for the stabilisation period.
//! At most one violation is counted per frame.

use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::debounce::{DebounceState, Debouncer};
use crate::detection::DetectionSnapshot;
use crate::timer::{secs, CountdownTimer};
use crate::violation::{ViolationKind, ViolationLedger, ViolationRecord};

/// Whether the session may go on after this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    /// The ledger went past `max_violations`.
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub violation: Option<ViolationRecord>,
    pub verdict: Verdict,
}

impl FrameOutcome {
    fn quiet() -> Self {
        Self {
            violation: None,
            verdict: Verdict::Continue,
        }
    }
}

struct SignalDebouncers {
    no_face: Debouncer,
    multiple_faces: Debouncer,
    face_distance: Debouncer,
    head_movement: Debouncer,
    eye_movement: Debouncer,
    phone: Debouncer,
}

impl SignalDebouncers {
    fn from_config(config: &SessionConfig) -> Self {
        let policy = config.repeat_policy;
        Self {
            no_face: Debouncer::new(secs(config.no_face_grace_period), policy),
            multiple_faces: Debouncer::new(secs(config.multiple_faces_grace_period), policy),
            face_distance: Debouncer::new(secs(config.face_distance_grace_period), policy),
            head_movement: Debouncer::new(secs(config.head_movement_grace_period), policy),
            eye_movement: Debouncer::new(secs(config.eye_movement_grace_period), policy),
            phone: Debouncer::new(secs(config.phone_grace_period), policy),
        }
    }

    /// Forget everything that only makes sense while exactly one face is
    /// in view.
    fn clear_single_face(&mut self) {
        self.face_distance.clear();
        self.head_movement.clear();
        self.eye_movement.clear();
        self.phone.clear();
    }
}

/// Session-scoped state mutated once per frame.
pub struct Monitor {
    debouncers: SignalDebouncers,
    violation_grace: Duration,
    violation_grace_timer: Option<CountdownTimer>,
    stabilization: Duration,
    alignment_timer: Option<CountdownTimer>,
    face_aligned: bool,
    phone_enabled: bool,
    ledger: ViolationLedger,
}

impl Monitor {
    pub fn new(config: &SessionConfig, started_at: Instant) -> Self {
        Self {
            debouncers: SignalDebouncers::from_config(config),
            violation_grace: config.violation_grace(),
            violation_grace_timer: None,
            stabilization: config.alignment_stabilization(),
            alignment_timer: None,
            face_aligned: false,
            phone_enabled: config.phone_detection_enabled,
            ledger: ViolationLedger::new(config.max_violations, started_at),
        }
    }

    /// Advance the state machine by one frame observed at `now`.
    pub fn tick(&mut self, snapshot: &DetectionSnapshot, now: Instant) -> FrameOutcome {
        match snapshot.face_count() {
            0 => self.tick_no_face(now),
            1 => self.tick_single_face(snapshot, now),
            _ => self.tick_multiple_faces(now),
        }
    }

    fn tick_no_face(&mut self, now: Instant) -> FrameOutcome {
        self.debouncers.multiple_faces.clear();
        self.debouncers.clear_single_face();
        self.reset_alignment();

        match self.debouncers.no_face.poll(true, now) {
            DebounceState::Fired => self.register(ViolationKind::NoFace, now),
            _ => FrameOutcome::quiet(),
        }
    }

    fn tick_multiple_faces(&mut self, now: Instant) -> FrameOutcome {
        self.debouncers.no_face.clear();
        self.debouncers.clear_single_face();
        self.reset_alignment();

        match self.debouncers.multiple_faces.poll(true, now) {
            DebounceState::Fired => self.register(ViolationKind::MultipleFaces, now),
            _ => FrameOutcome::quiet(),
        }
    }

    fn tick_single_face(&mut self, snapshot: &DetectionSnapshot, now: Instant) -> FrameOutcome {
        self.debouncers.no_face.clear();
        self.debouncers.multiple_faces.clear();

        // Distance takes priority over everything else, grace window included
        if !snapshot.distance_valid {
            self.reset_alignment();
            self.debouncers.head_movement.clear();
            self.debouncers.eye_movement.clear();
            let state = self.debouncers.face_distance.poll(true, now);
            if state == DebounceState::Fired {
                return self.register(ViolationKind::FaceDistance, now);
            }
            return self.tick_phone(snapshot, now).unwrap_or_else(FrameOutcome::quiet);
        }
        self.debouncers.face_distance.clear();

        if let Some(outcome) = self.tick_phone(snapshot, now) {
            return outcome;
        }

        // Alignment only survives the grace window while the head stays straight
        if self.in_grace(now) {
            self.debouncers.head_movement.clear();
            self.debouncers.eye_movement.clear();
            if snapshot.head_aligned != Some(true) {
                self.reset_alignment();
            }
            return FrameOutcome::quiet();
        }

        match snapshot.head_aligned {
            None => {
                self.debouncers.head_movement.clear();
                self.debouncers.eye_movement.clear();
                self.reset_alignment();
                FrameOutcome::quiet()
            }
            Some(false) => {
                self.reset_alignment();
                self.debouncers.eye_movement.clear();
                match self.debouncers.head_movement.poll(true, now) {
                    DebounceState::Fired => self.register(ViolationKind::HeadMovement, now),
                    _ => FrameOutcome::quiet(),
                }
            }
            Some(true) => {
                self.debouncers.head_movement.clear();
                self.advance_alignment(now);
                self.tick_eye(snapshot, now)
            }
        }
    }

    /// Returns an outcome only when a phone violation was counted.
    fn tick_phone(&mut self, snapshot: &DetectionSnapshot, now: Instant) -> Option<FrameOutcome> {
        if !self.phone_enabled {
            return None;
        }
        match self.debouncers.phone.poll(snapshot.phone_detected, now) {
            DebounceState::Fired => Some(self.register(ViolationKind::MobilePhone, now)),
            _ => None,
        }
    }

    fn tick_eye(&mut self, snapshot: &DetectionSnapshot, now: Instant) -> FrameOutcome {
        if !self.face_aligned {
            self.debouncers.eye_movement.clear();
            return FrameOutcome::quiet();
        }
        match self
            .debouncers
            .eye_movement
            .poll(snapshot.eye_suspicious, now)
        {
            DebounceState::Fired => self.register(ViolationKind::EyeMovement, now),
            _ => FrameOutcome::quiet(),
        }
    }

    fn advance_alignment(&mut self, now: Instant) {
        let timer = *self.alignment_timer.get_or_insert_with(|| {
            tracing::debug!(
                secs = self.stabilization.as_secs_f64(),
                "face aligned; waiting to stabilize"
            );
            CountdownTimer::start_at(now, self.stabilization)
        });
        if !self.face_aligned && timer.expired_at(now) {
            tracing::debug!("face alignment stable; eye checks enabled");
            self.face_aligned = true;
        }
    }

    fn reset_alignment(&mut self) {
        self.face_aligned = false;
        self.alignment_timer = None;
    }

    fn in_grace(&mut self, now: Instant) -> bool {
        match self.violation_grace_timer {
            Some(timer) if !timer.expired_at(now) => true,
            Some(_) => {
                self.violation_grace_timer = None;
                false
            }
            None => false,
        }
    }

    fn register(&mut self, kind: ViolationKind, now: Instant) -> FrameOutcome {
        let may_continue = self.ledger.register_at(kind, now);
        self.violation_grace_timer = Some(CountdownTimer::start_at(now, self.violation_grace));

        FrameOutcome {
            violation: self.ledger.last().cloned(),
            verdict: if may_continue {
                Verdict::Continue
            } else {
                Verdict::Terminate
            },
        }
    }

    /// Whether eye gaze is currently being evaluated.
    pub fn face_aligned(&self) -> bool {
        self.face_aligned
    }

    pub fn in_grace_at(&self, now: Instant) -> bool {
        self.violation_grace_timer
            .is_some_and(|timer| !timer.expired_at(now))
    }

    /// Time left before eye checks start, while the head is stabilising.
    pub fn alignment_remaining(&self, now: Instant) -> Option<Duration> {
        if self.face_aligned {
            return None;
        }
        self.alignment_timer.map(|t| t.remaining_at(now))
    }

    pub fn ledger(&self) -> &ViolationLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> ViolationLedger {
        self.ledger
    }
}
