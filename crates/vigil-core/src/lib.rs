//! vigil-core — violation tracking for proctored test sessions.
//!
//! Turns noisy per-frame detector output into debounced, grace-gated
//! violation events and decides when a session must end. Computer vision
//! itself lives behind the traits in [`detection`].

pub mod alignment;
pub mod config;
pub mod debounce;
pub mod detection;
pub mod monitor;
pub mod overlay;
pub mod session;
pub mod timer;
pub mod violation;

pub use alignment::{BoxCenteringAlignment, EyePositionGaze, LandmarkAlignment};
pub use config::{ConfigError, SessionConfig};
pub use debounce::{DebounceState, Debouncer, RepeatPolicy};
pub use detection::{
    AlignmentClassifier, DetectionSnapshot, DetectorError, Detectors, DistanceValidator, FaceBox,
    FaceDetector, Frame, FrameSize, GazeClassifier, LandmarkDetector, Landmarks, PhoneDetector,
};
pub use monitor::{FrameOutcome, Monitor, Verdict};
pub use overlay::{NullOverlay, Overlay, OverlayPosition};
pub use session::{EndReason, FrameSource, FrameSourceError, Session, SessionSummary};
pub use timer::CountdownTimer;
pub use violation::{ViolationKind, ViolationLedger, ViolationRecord};
