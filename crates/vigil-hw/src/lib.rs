//! vigil-hw — frame sources for proctored sessions.
//!
//! Two sources are provided: still images from a directory, and a detection
//! log that replays recorded detector output frame by frame. Either can be
//! wrapped in [`Paced`] to play back at capture speed.

pub mod frame_dir;
pub mod pacing;
pub mod replay;

pub use frame_dir::ImageDirSource;
pub use pacing::Paced;
pub use replay::{ReplayDetections, ReplayLog, ReplayRecord, ReplaySource};
