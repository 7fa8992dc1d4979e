//! Contracts with the computer-vision collaborators.
//!
//! The monitor never looks at pixels. Face detection, landmarking, gaze and
//! object classification are pretrained capabilities supplied by whatever
//! backend the binary wires in; this module only fixes their shapes and
//! collapses their per-frame answers into a [`DetectionSnapshot`].

use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("{stage} backend failed: {message}")]
    Backend {
        stage: &'static str,
        message: String,
    },
    #[error("frame {sequence} has no recorded detections")]
    MissingRecord { sequence: u64 },
}

/// One captured frame: an opaque 8-bit RGB buffer plus capture metadata.
///
/// Replayed frames may carry an empty buffer; backends that need pixels
/// must check `data.len()`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 0-based position in the source.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn size(&self) -> FrameSize {
        FrameSize {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Axis-aligned face bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }
}

/// Five-point facial landmarks, SCRFD order: left eye, right eye, nose tip,
/// left mouth corner, right mouth corner.
pub type Landmarks = [(f32, f32); 5];

pub const LEFT_EYE: usize = 0;
pub const RIGHT_EYE: usize = 1;
pub const NOSE: usize = 2;

pub trait FaceDetector: Send {
    /// All faces visible in the frame, possibly none.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, DetectorError>;
}

pub trait LandmarkDetector: Send {
    /// Landmarks for the dominant face, `None` when no face resolves
    /// confidently.
    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>, DetectorError>;
}

/// Decides whether the head faces the screen.
///
/// `None` means the classifier cannot tell (typically no landmarks) and the
/// monitor treats the frame as neutral for head and eye checks.
pub trait AlignmentClassifier: Send {
    fn evaluate(
        &self,
        face: &FaceBox,
        landmarks: Option<&Landmarks>,
        frame: FrameSize,
    ) -> Option<bool>;
}

pub trait GazeClassifier: Send {
    /// `true` when the eyes look away from the screen.
    fn evaluate(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
        landmarks: Option<&Landmarks>,
    ) -> Result<bool, DetectorError>;
}

pub trait PhoneDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<bool, DetectorError>;
}

/// Checks that the face occupies a sane share of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceValidator {
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl DistanceValidator {
    pub fn new(min_ratio: f64, max_ratio: f64) -> Self {
        Self {
            min_ratio,
            max_ratio,
        }
    }

    /// Face area / frame area within `[min_ratio, max_ratio]`, both ends
    /// inclusive. A zero-area frame is never valid.
    pub fn evaluate(&self, face: &FaceBox, frame: FrameSize) -> bool {
        let frame_area = frame.area();
        if frame_area == 0 {
            return false;
        }
        let ratio = face.area() as f64 / frame_area as f64;
        self.min_ratio <= ratio && ratio <= self.max_ratio
    }
}

/// Detector signals for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSnapshot {
    pub face_boxes: Vec<FaceBox>,
    /// `None` when alignment could not be determined.
    pub head_aligned: Option<bool>,
    /// Only meaningful when `head_aligned == Some(true)`.
    pub eye_suspicious: bool,
    /// Only meaningful when exactly one face is present.
    pub distance_valid: bool,
    pub phone_detected: bool,
}

impl DetectionSnapshot {
    pub fn face_count(&self) -> usize {
        self.face_boxes.len()
    }

    pub fn no_face() -> Self {
        Self {
            face_boxes: Vec::new(),
            head_aligned: None,
            eye_suspicious: false,
            distance_valid: false,
            phone_detected: false,
        }
    }
}

/// The full capability set the session needs, behind swappable backends.
pub struct Detectors {
    pub faces: Box<dyn FaceDetector>,
    pub landmarks: Box<dyn LandmarkDetector>,
    pub alignment: Box<dyn AlignmentClassifier>,
    pub gaze: Box<dyn GazeClassifier>,
    pub phone: Option<Box<dyn PhoneDetector>>,
    pub distance: DistanceValidator,
}

impl Detectors {
    /// Run the detectors a frame needs and collect their answers.
    ///
    /// Landmarks, alignment, distance and phone only run for exactly one
    /// face; gaze only runs once the head is known to be aligned.
    pub fn snapshot(&mut self, frame: &Frame) -> Result<DetectionSnapshot, DetectorError> {
        let face_boxes = self.faces.detect(frame)?;
        if face_boxes.len() != 1 {
            return Ok(DetectionSnapshot {
                face_boxes,
                ..DetectionSnapshot::no_face()
            });
        }
        let face = face_boxes[0];

        let phone_detected = match self.phone.as_mut() {
            Some(phone) => phone.detect(frame)?,
            None => false,
        };

        let size = frame.size();
        let distance_valid = self.distance.evaluate(&face, size);
        let landmarks = self.landmarks.detect(frame)?;
        let head_aligned = self.alignment.evaluate(&face, landmarks.as_ref(), size);
        let eye_suspicious = if head_aligned == Some(true) {
            self.gaze.evaluate(frame, &face, landmarks.as_ref())?
        } else {
            false
        };

        Ok(DetectionSnapshot {
            face_boxes,
            head_aligned,
            eye_suspicious,
            distance_valid,
            phone_detected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::BoxCenteringAlignment;

    fn face(x: u32, y: u32, w: u32, h: u32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn frame() -> Frame {
        Frame {
            sequence: 0,
            width: 100,
            height: 100,
            data: Vec::new(),
            captured_at: Instant::now(),
        }
    }

    struct FixedFaces(Vec<FaceBox>);
    impl FaceDetector for FixedFaces {
        fn detect(&mut self, _: &Frame) -> Result<Vec<FaceBox>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    struct NoLandmarks;
    impl LandmarkDetector for NoLandmarks {
        fn detect(&mut self, _: &Frame) -> Result<Option<Landmarks>, DetectorError> {
            Ok(None)
        }
    }

    /// Counts calls so tests can assert the classifier was skipped.
    struct CountingGaze {
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }
    impl GazeClassifier for CountingGaze {
        fn evaluate(
            &mut self,
            _: &Frame,
            _: &FaceBox,
            _: Option<&Landmarks>,
        ) -> Result<bool, DetectorError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(true)
        }
    }

    struct FailingPhone;
    impl PhoneDetector for FailingPhone {
        fn detect(&mut self, _: &Frame) -> Result<bool, DetectorError> {
            Err(DetectorError::Backend {
                stage: "phone",
                message: "model not loaded".into(),
            })
        }
    }

    fn detectors(
        faces: Vec<FaceBox>,
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    ) -> Detectors {
        Detectors {
            faces: Box::new(FixedFaces(faces)),
            landmarks: Box::new(NoLandmarks),
            alignment: Box::new(BoxCenteringAlignment::default()),
            gaze: Box::new(CountingGaze { calls }),
            phone: None,
            distance: DistanceValidator::new(0.05, 0.40),
        }
    }

    #[test]
    fn test_distance_min_boundary_is_inclusive() {
        let v = DistanceValidator::new(0.25, 0.5);
        let size = FrameSize {
            width: 100,
            height: 100,
        };
        // 50 * 50 = 2500 = 0.25 of 10000
        assert!(v.evaluate(&face(0, 0, 50, 50), size));
        // 2499 / 10000 just below the band
        assert!(!v.evaluate(&face(0, 0, 49, 51), size));
    }

    #[test]
    fn test_distance_max_boundary_is_inclusive() {
        let v = DistanceValidator::new(0.1, 0.5);
        let size = FrameSize {
            width: 100,
            height: 100,
        };
        assert!(v.evaluate(&face(0, 0, 100, 50), size));
        assert!(!v.evaluate(&face(0, 0, 100, 51), size));
    }

    #[test]
    fn test_distance_zero_area_frame_is_invalid() {
        let v = DistanceValidator::new(0.0, 1.0);
        let size = FrameSize {
            width: 0,
            height: 480,
        };
        assert!(!v.evaluate(&face(0, 0, 10, 10), size));
    }

    #[test]
    fn test_snapshot_no_faces_skips_per_face_work() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut d = detectors(Vec::new(), calls.clone());
        let snap = d.snapshot(&frame()).unwrap();
        assert_eq!(snap.face_count(), 0);
        assert_eq!(snap.head_aligned, None);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_multiple_faces_skips_per_face_work() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut d = detectors(vec![face(0, 0, 20, 20), face(60, 0, 20, 20)], calls.clone());
        let snap = d.snapshot(&frame()).unwrap();
        assert_eq!(snap.face_count(), 2);
        assert_eq!(snap.head_aligned, None);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_single_centered_face_runs_gaze() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut d = detectors(vec![face(35, 35, 30, 30)], calls.clone());
        let snap = d.snapshot(&frame()).unwrap();
        assert_eq!(snap.head_aligned, Some(true));
        assert!(snap.distance_valid);
        assert!(snap.eye_suspicious);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_off_center_face_skips_gaze() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut d = detectors(vec![face(0, 35, 30, 30)], calls.clone());
        let snap = d.snapshot(&frame()).unwrap();
        assert_eq!(snap.head_aligned, Some(false));
        assert!(!snap.eye_suspicious);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_multiple_faces_skips_phone() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut d = detectors(vec![face(0, 0, 20, 20), face(60, 0, 20, 20)], calls);
        // would error if it were asked
        d.phone = Some(Box::new(FailingPhone));
        let snap = d.snapshot(&frame()).unwrap();
        assert_eq!(snap.face_count(), 2);
        assert!(!snap.phone_detected);
    }

    #[test]
    fn test_snapshot_propagates_backend_error() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut d = detectors(vec![face(35, 35, 30, 30)], calls);
        d.phone = Some(Box::new(FailingPhone));
        let err = d.snapshot(&frame()).unwrap_err();
        assert!(matches!(err, DetectorError::Backend { stage: "phone", .. }));
    }
}
