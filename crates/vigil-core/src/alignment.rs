//! Geometry-only classifiers for head alignment and eye gaze.
//!
//! Two alignment classifiers are provided and are not interchangeable in
//! their thresholds:
//!
//! - [`BoxCenteringAlignment`] treats a face whose bounding box sits near
//!   the horizontal centre of the frame as facing the screen. It needs no
//!   landmarks and always answers for a detected face.
//! - [`LandmarkAlignment`] estimates yaw from how far the nose tip sits from
//!   the eye midpoint, and roll from the slope of the eye line. It answers
//!   `None` when the landmark detector produced nothing.
//!
//! [`EyePositionGaze`] flags gaze as suspicious when either eye sits near
//! the edge of the face box, the way eyes shift when a candidate looks at a
//! second screen without turning their head.

use crate::detection::{
    AlignmentClassifier, DetectorError, FaceBox, Frame, FrameSize, GazeClassifier, Landmarks,
    LEFT_EYE, NOSE, RIGHT_EYE,
};

/// Default maximum horizontal offset of the face centre from the frame
/// centre, as a fraction of frame width.
const DEFAULT_MAX_CENTER_DEVIATION: f32 = 0.15;

/// Default maximum nose offset from the eye midpoint, as a fraction of the
/// inter-ocular distance. A frontal face sits near 0.0; a face turned about
/// 30 degrees sits near 0.4.
const DEFAULT_MAX_YAW_RATIO: f32 = 0.35;

const DEFAULT_MAX_ROLL_DEGREES: f32 = 15.0;

#[derive(Debug, Clone, Copy)]
pub struct BoxCenteringAlignment {
    pub max_deviation: f32,
}

impl Default for BoxCenteringAlignment {
    fn default() -> Self {
        Self {
            max_deviation: DEFAULT_MAX_CENTER_DEVIATION,
        }
    }
}

impl AlignmentClassifier for BoxCenteringAlignment {
    fn evaluate(
        &self,
        face: &FaceBox,
        _landmarks: Option<&Landmarks>,
        frame: FrameSize,
    ) -> Option<bool> {
        if frame.width == 0 {
            return None;
        }
        let frame_center = frame.width as f32 / 2.0;
        let deviation = (face.center_x() - frame_center).abs() / frame.width as f32;
        Some(deviation < self.max_deviation)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LandmarkAlignment {
    pub max_yaw_ratio: f32,
    pub max_roll_degrees: f32,
}

impl Default for LandmarkAlignment {
    fn default() -> Self {
        Self {
            max_yaw_ratio: DEFAULT_MAX_YAW_RATIO,
            max_roll_degrees: DEFAULT_MAX_ROLL_DEGREES,
        }
    }
}

/// Yaw ratio and roll angle (degrees) derived from five-point landmarks.
/// `None` if both eyes coincide.
pub fn head_pose(landmarks: &Landmarks) -> Option<(f32, f32)> {
    let (lx, ly) = landmarks[LEFT_EYE];
    let (rx, ry) = landmarks[RIGHT_EYE];
    let (nx, _) = landmarks[NOSE];

    let dx = rx - lx;
    let dy = ry - ly;
    let inter_ocular = (dx * dx + dy * dy).sqrt();
    if inter_ocular < f32::EPSILON {
        return None;
    }

    let mid_x = (lx + rx) / 2.0;
    let yaw_ratio = (nx - mid_x).abs() / inter_ocular;
    // Absolute components so a mirrored feed gives the same angle
    let roll = dy.abs().atan2(dx.abs()).to_degrees();
    Some((yaw_ratio, roll))
}

impl AlignmentClassifier for LandmarkAlignment {
    fn evaluate(
        &self,
        _face: &FaceBox,
        landmarks: Option<&Landmarks>,
        _frame: FrameSize,
    ) -> Option<bool> {
        let (yaw_ratio, roll) = head_pose(landmarks?)?;
        Some(yaw_ratio <= self.max_yaw_ratio && roll <= self.max_roll_degrees)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EyePositionGaze {
    pub min_ratio: f32,
    pub max_ratio: f32,
}

impl Default for EyePositionGaze {
    fn default() -> Self {
        Self {
            min_ratio: 0.2,
            max_ratio: 0.8,
        }
    }
}

impl EyePositionGaze {
    /// Horizontal eye position within the face box, 0.0 at the left edge.
    fn eye_ratio(face: &FaceBox, eye: (f32, f32)) -> f32 {
        (eye.0 - face.x as f32) / face.width as f32
    }

    pub fn is_suspicious(&self, face: &FaceBox, landmarks: &Landmarks) -> bool {
        if face.width == 0 {
            return false;
        }
        [landmarks[LEFT_EYE], landmarks[RIGHT_EYE]]
            .into_iter()
            .map(|eye| Self::eye_ratio(face, eye))
            .any(|r| r < self.min_ratio || r > self.max_ratio)
    }
}

impl GazeClassifier for EyePositionGaze {
    fn evaluate(
        &mut self,
        _frame: &Frame,
        face: &FaceBox,
        landmarks: Option<&Landmarks>,
    ) -> Result<bool, DetectorError> {
        // Without eye positions there is nothing to judge; assume normal gaze
        Ok(landmarks.is_some_and(|lm| self.is_suspicious(face, lm)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: FrameSize = FrameSize {
        width: 640,
        height: 480,
    };

    /// Helper: landmarks with the given eyes and nose, mouth at origin.
    fn landmarks(left: (f32, f32), right: (f32, f32), nose: (f32, f32)) -> Landmarks {
        [left, right, nose, (0.0, 0.0), (0.0, 0.0)]
    }

    fn face_at(x: u32, width: u32) -> FaceBox {
        FaceBox {
            x,
            y: 100,
            width,
            height: width,
        }
    }

    #[test]
    fn test_box_centered_face_is_straight() {
        let c = BoxCenteringAlignment::default();
        // centre 320 == frame centre
        assert_eq!(c.evaluate(&face_at(220, 200), None, FRAME), Some(true));
    }

    #[test]
    fn test_box_off_center_face_is_turned() {
        let c = BoxCenteringAlignment::default();
        // centre 420, deviation 100 / 640 = 0.156
        assert_eq!(c.evaluate(&face_at(320, 200), None, FRAME), Some(false));
        // centre 400, deviation 80 / 640 = 0.125
        assert_eq!(c.evaluate(&face_at(300, 200), None, FRAME), Some(true));
    }

    #[test]
    fn test_box_ignores_landmarks() {
        let c = BoxCenteringAlignment::default();
        let lm = landmarks((0.0, 0.0), (1.0, 0.0), (500.0, 0.0));
        assert_eq!(c.evaluate(&face_at(220, 200), Some(&lm), FRAME), Some(true));
    }

    #[test]
    fn test_landmark_unknown_without_landmarks() {
        let c = LandmarkAlignment::default();
        assert_eq!(c.evaluate(&face_at(220, 200), None, FRAME), None);
    }

    #[test]
    fn test_landmark_frontal_face_is_straight() {
        let c = LandmarkAlignment::default();
        let lm = landmarks((280.0, 200.0), (360.0, 200.0), (322.0, 240.0));
        assert_eq!(c.evaluate(&face_at(220, 200), Some(&lm), FRAME), Some(true));
    }

    #[test]
    fn test_landmark_yawed_face_is_turned() {
        let c = LandmarkAlignment::default();
        // nose 40 px off a midpoint with 80 px inter-ocular distance: ratio 0.5
        let lm = landmarks((280.0, 200.0), (360.0, 200.0), (360.0, 240.0));
        assert_eq!(c.evaluate(&face_at(220, 200), Some(&lm), FRAME), Some(false));
    }

    #[test]
    fn test_landmark_rolled_face_is_turned() {
        let c = LandmarkAlignment::default();
        // eye line at 45 degrees
        let lm = landmarks((280.0, 200.0), (340.0, 260.0), (310.0, 260.0));
        assert_eq!(c.evaluate(&face_at(220, 200), Some(&lm), FRAME), Some(false));
    }

    #[test]
    fn test_landmark_mirrored_feed_matches() {
        let c = LandmarkAlignment::default();
        let lm = landmarks((360.0, 200.0), (280.0, 200.0), (322.0, 240.0));
        assert_eq!(c.evaluate(&face_at(220, 200), Some(&lm), FRAME), Some(true));
    }

    #[test]
    fn test_landmark_degenerate_eyes_unknown() {
        let c = LandmarkAlignment::default();
        let lm = landmarks((300.0, 200.0), (300.0, 200.0), (300.0, 240.0));
        assert_eq!(c.evaluate(&face_at(220, 200), Some(&lm), FRAME), None);
    }

    #[test]
    fn test_head_pose_values() {
        // Known geometry: eyes 100 px apart, nose 25 px right of midpoint
        let lm = landmarks((100.0, 50.0), (200.0, 50.0), (175.0, 90.0));
        let (yaw, roll) = head_pose(&lm).unwrap();
        assert!((yaw - 0.25).abs() < 1e-6);
        assert!(roll.abs() < 1e-6);
    }

    #[test]
    fn test_gaze_centered_eyes_normal() {
        let g = EyePositionGaze::default();
        // face spans 200..400; eyes at ratios 0.3 and 0.7
        let lm = landmarks((260.0, 200.0), (340.0, 200.0), (300.0, 240.0));
        assert!(!g.is_suspicious(&face_at(200, 200), &lm));
    }

    #[test]
    fn test_gaze_eye_near_edge_suspicious() {
        let g = EyePositionGaze::default();
        // left eye at ratio 0.1
        let lm = landmarks((220.0, 200.0), (300.0, 200.0), (260.0, 240.0));
        assert!(g.is_suspicious(&face_at(200, 200), &lm));
        // right eye at ratio 0.9
        let lm = landmarks((300.0, 200.0), (380.0, 200.0), (340.0, 240.0));
        assert!(g.is_suspicious(&face_at(200, 200), &lm));
    }

    #[test]
    fn test_gaze_without_landmarks_is_normal() {
        let mut g = EyePositionGaze::default();
        let frame = Frame {
            sequence: 0,
            width: 640,
            height: 480,
            data: Vec::new(),
            captured_at: std::time::Instant::now(),
        };
        assert!(!g.evaluate(&frame, &face_at(200, 200), None).unwrap());
    }
}
