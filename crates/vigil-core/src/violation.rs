use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Kinds of behaviour the monitor counts against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    NoFace,
    MultipleFaces,
    FaceDistance,
    HeadMovement,
    EyeMovement,
    MobilePhone,
}

impl ViolationKind {
    /// Message shown to the candidate and printed in the summary.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoFace => "No face detected",
            Self::MultipleFaces => "Multiple faces detected",
            Self::FaceDistance => "Face too close or too far",
            Self::HeadMovement => "Face moved away from screen",
            Self::EyeMovement => "Suspicious eye movement",
            Self::MobilePhone => "Mobile phone detected",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One counted violation. Never mutated after the ledger creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationRecord {
    pub kind: ViolationKind,
    /// 1-based position in the ledger.
    pub sequence_number: u32,
    /// Offset from session start.
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Append-only violation log with a cutoff.
///
/// `register` never fails; it reports whether the session may continue.
/// The session may continue while `count <= max_violations`, so the
/// violation that takes the count past the limit is still recorded.
#[derive(Debug, Clone)]
pub struct ViolationLedger {
    max_violations: u32,
    started_at: Instant,
    records: Vec<ViolationRecord>,
}

impl ViolationLedger {
    pub fn new(max_violations: u32, started_at: Instant) -> Self {
        Self {
            max_violations,
            started_at,
            records: Vec::new(),
        }
    }

    /// Record a violation observed at `now`. Returns `false` once the new
    /// count exceeds `max_violations`.
    pub fn register_at(&mut self, kind: ViolationKind, now: Instant) -> bool {
        let record = ViolationRecord {
            kind,
            sequence_number: self.count() + 1,
            elapsed: now.saturating_duration_since(self.started_at),
        };
        self.records.push(record);

        let count = self.count();
        tracing::warn!(
            sequence = count,
            max = self.max_violations,
            kind = %kind,
            "violation registered"
        );
        count <= self.max_violations
    }

    pub fn register(&mut self, kind: ViolationKind) -> bool {
        self.register_at(kind, Instant::now())
    }

    pub fn count(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    pub fn records(&self) -> &[ViolationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ViolationRecord> {
        self.records.last()
    }

    /// Whether the limit has already been exceeded.
    pub fn exceeded(&self) -> bool {
        self.count() > self.max_violations
    }

    pub fn into_records(self) -> Vec<ViolationRecord> {
        self.records
    }
}
