//! Replay of recorded detector output.
//!
//! A detection log is JSON lines, one record per frame:
//!
//! ```text
//! {"t": 0.033, "width": 640, "height": 480,
//!  "faces": [{"x": 220, "y": 140, "width": 200, "height": 200}],
//!  "landmarks": [[280, 200], [360, 200], [320, 240], [290, 290], [350, 290]],
//!  "gaze_suspicious": false, "phone": false}
//! ```
//!
//! `t` is seconds from capture start, must fit a `Duration` and must not
//! decrease. Blank lines and lines starting with `#` are ignored. The log
//! serves both as a frame source (frames without pixels) and as the detector
//! backend, matched to frames by sequence number.

use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use vigil_core::{
    DetectorError, FaceBox, FaceDetector, Frame, FrameSource, FrameSourceError, GazeClassifier,
    LandmarkDetector, Landmarks, PhoneDetector,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayRecord {
    pub t: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub faces: Vec<FaceBox>,
    #[serde(default)]
    pub landmarks: Option<[[f32; 2]; 5]>,
    #[serde(default)]
    pub gaze_suspicious: bool,
    #[serde(default)]
    pub phone: bool,
}

impl ReplayRecord {
    pub fn offset(&self) -> Duration {
        vigil_core::timer::secs(self.t)
    }

    pub fn landmarks(&self) -> Option<Landmarks> {
        self.landmarks.map(|pts| pts.map(|[x, y]| (x, y)))
    }
}

#[derive(Debug, Default)]
pub struct ReplayLog {
    records: Vec<ReplayRecord>,
}

impl ReplayLog {
    pub fn load(path: &Path) -> Result<Self, FrameSourceError> {
        let file = std::fs::File::open(path).map_err(|source| FrameSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let log = Self::parse(std::io::BufReader::new(file)).map_err(|e| match e {
            FrameSourceError::Io { source, .. } => FrameSourceError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), frames = log.len(), "detection log loaded");
        Ok(log)
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self, FrameSourceError> {
        let mut records: Vec<ReplayRecord> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| FrameSourceError::Io {
                path: "<replay>".into(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let record: ReplayRecord =
                serde_json::from_str(trimmed).map_err(|e| FrameSourceError::Malformed {
                    line: line_no,
                    message: e.to_string(),
                })?;

            if vigil_core::timer::try_secs(record.t).is_none() {
                return Err(FrameSourceError::Malformed {
                    line: line_no,
                    message: format!("invalid timestamp {}", record.t),
                });
            }
            if let Some(prev) = records.last() {
                if record.t < prev.t {
                    return Err(FrameSourceError::Malformed {
                        line: line_no,
                        message: format!("timestamp {} goes backwards from {}", record.t, prev.t),
                    });
                }
            }
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, sequence: u64) -> Option<&ReplayRecord> {
        usize::try_from(sequence)
            .ok()
            .and_then(|i| self.records.get(i))
    }
}

/// Frames stamped with the recorded timing, carrying no pixel data.
pub struct ReplaySource {
    log: Arc<ReplayLog>,
    base: Instant,
    next: u64,
}

impl ReplaySource {
    pub fn new(log: Arc<ReplayLog>, base: Instant) -> Self {
        Self { log, base, next: 0 }
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(record) = self.log.get(self.next) else {
            return Ok(None);
        };
        let captured_at = self
            .base
            .checked_add(record.offset())
            .ok_or(FrameSourceError::Timestamp { sequence: self.next })?;
        let frame = Frame {
            sequence: self.next,
            width: record.width,
            height: record.height,
            data: Vec::new(),
            captured_at,
        };
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Serves recorded detector answers for each frame.
#[derive(Clone)]
pub struct ReplayDetections {
    log: Arc<ReplayLog>,
}

impl ReplayDetections {
    pub fn new(log: Arc<ReplayLog>) -> Self {
        Self { log }
    }

    fn record(&self, frame: &Frame) -> Result<&ReplayRecord, DetectorError> {
        self.log
            .get(frame.sequence)
            .ok_or(DetectorError::MissingRecord {
                sequence: frame.sequence,
            })
    }
}

impl FaceDetector for ReplayDetections {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, DetectorError> {
        Ok(self.record(frame)?.faces.clone())
    }
}

impl LandmarkDetector for ReplayDetections {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>, DetectorError> {
        Ok(self.record(frame)?.landmarks())
    }
}

impl GazeClassifier for ReplayDetections {
    fn evaluate(
        &mut self,
        frame: &Frame,
        _face: &FaceBox,
        _landmarks: Option<&Landmarks>,
    ) -> Result<bool, DetectorError> {
        Ok(self.record(frame)?.gaze_suspicious)
    }
}

impl PhoneDetector for ReplayDetections {
    fn detect(&mut self, frame: &Frame) -> Result<bool, DetectorError> {
        Ok(self.record(frame)?.phone)
    }
}
