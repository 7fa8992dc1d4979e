use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::detection::{Detectors, Frame};
use crate::monitor::{Monitor, Verdict};
use crate::overlay::{self, Overlay};
use crate::timer::CountdownTimer;
use crate::violation::ViolationRecord;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode frame {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("malformed replay record at line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("frame {sequence} is stamped outside the clock range")]
    Timestamp { sequence: u64 },
    #[error("frame rate must be a positive number with a representable interval (got {fps})")]
    InvalidFrameRate { fps: f64 },
}

/// Blocking pull source of frames. `Ok(None)` is end of stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    TimeExpired,
    ViolationLimit,
    Aborted,
    SourceExhausted,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TimeExpired => "test time limit reached",
            Self::ViolationLimit => "maximum violations exceeded",
            Self::Aborted => "aborted",
            Self::SourceExhausted => "camera feed ended",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub end_reason: EndReason,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub total_violations: u32,
    pub max_violations: u32,
    pub violations: Vec<ViolationRecord>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test Ended ({})", self.end_reason)?;
        writeln!(f, "Total violations: {}", self.total_violations)?;
        writeln!(f, "Violation Details:")?;
        for v in &self.violations {
            writeln!(
                f,
                "  - [{}] {} (at {:.1}s)",
                v.sequence_number,
                v.kind,
                v.elapsed.as_secs_f64()
            )?;
        }
        Ok(())
    }
}

/// One proctored test: pulls frames, runs detectors, drives the monitor
/// and the overlay until time runs out, the violation limit is passed, the
/// feed ends or an abort is requested.
pub struct Session {
    source: Box<dyn FrameSource>,
    detectors: Detectors,
    overlay: Box<dyn Overlay>,
    monitor: Monitor,
    test_timer: CountdownTimer,
    max_violations: u32,
    session_id: Uuid,
    started_wall: DateTime<Utc>,
    frames_processed: u64,
    frames_skipped: u64,
}

impl Session {
    pub fn new(
        config: &SessionConfig,
        source: Box<dyn FrameSource>,
        detectors: Detectors,
        overlay: Box<dyn Overlay>,
        started_at: Instant,
    ) -> Self {
        Self {
            source,
            detectors,
            overlay,
            monitor: Monitor::new(config, started_at),
            test_timer: CountdownTimer::start_at(started_at, config.test_duration()),
            max_violations: config.max_violations,
            session_id: Uuid::new_v4(),
            started_wall: Utc::now(),
            frames_processed: 0,
            frames_skipped: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Run to completion. Only a failing frame source is an error.
    pub fn run(mut self, abort: &AtomicBool) -> Result<SessionSummary, FrameSourceError> {
        tracing::info!(
            session = %self.session_id,
            duration_secs = self.test_timer.duration().as_secs(),
            max_violations = self.max_violations,
            "test started"
        );

        let reason = loop {
            if abort.load(Ordering::SeqCst) {
                break EndReason::Aborted;
            }

            let Some(frame) = self.source.next_frame()? else {
                break EndReason::SourceExhausted;
            };
            let now = frame.captured_at;

            if self.test_timer.expired_at(now) {
                break EndReason::TimeExpired;
            }

            if self.step(&frame) == Verdict::Terminate {
                break EndReason::ViolationLimit;
            }
        };

        tracing::info!(
            session = %self.session_id,
            reason = %reason,
            violations = self.monitor.ledger().count(),
            frames = self.frames_processed,
            "test ended"
        );

        Ok(SessionSummary {
            session_id: self.session_id,
            started_at: self.started_wall,
            end_reason: reason,
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            total_violations: self.monitor.ledger().count(),
            max_violations: self.max_violations,
            violations: self.monitor.into_ledger().into_records(),
        })
    }

    /// Process one frame; detector failures skip the frame without touching
    /// any timer.
    fn step(&mut self, frame: &Frame) -> Verdict {
        let snapshot = match self.detectors.snapshot(frame) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(frame = frame.sequence, error = %e, "detection failed; frame skipped");
                self.frames_skipped += 1;
                return Verdict::Continue;
            }
        };
        self.frames_processed += 1;

        let outcome = self.monitor.tick(&snapshot, frame.captured_at);
        self.render(frame);
        outcome.verdict
    }

    fn render(&mut self, frame: &Frame) {
        let now = frame.captured_at;
        let time_left = format!("Time Left: {}s", self.test_timer.remaining_at(now).as_secs());
        let violations = format!(
            "Violations: {}/{}",
            self.monitor.ledger().count(),
            self.max_violations
        );
        tracing::trace!(frame = frame.sequence, %time_left, %violations, "overlay");

        self.overlay.draw(frame, &time_left, overlay::TIME_LEFT);
        self.overlay.draw(frame, &violations, overlay::VIOLATIONS);
        if let Some(left) = self.monitor.alignment_remaining(now) {
            let text = format!("Align face: {}s", left.as_secs());
            self.overlay.draw(frame, &text, overlay::ALIGNMENT);
        }
        self.overlay.present(frame);
    }
}
