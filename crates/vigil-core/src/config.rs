use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::debounce::RepeatPolicy;
use crate::timer::{secs, try_secs};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative number of seconds that fits a duration (got {value})")]
    InvalidDuration { key: &'static str, value: f64 },
    #[error("test_duration_seconds must be greater than zero")]
    ZeroTestDuration,
    #[error("{key} must be within [0, 1] (got {value})")]
    RatioOutOfRange { key: &'static str, value: f64 },
    #[error("face_min_area_ratio ({min}) is greater than face_max_area_ratio ({max})")]
    InvertedRatioBand { min: f64, max: f64 },
}

/// Tunables for one proctored session. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Total length of the test.
    pub test_duration_seconds: f64,
    /// Violations tolerated before the session is terminated.
    pub max_violations: u32,
    /// How long no face may be visible before it counts.
    pub no_face_grace_period: f64,
    pub multiple_faces_grace_period: f64,
    pub face_distance_grace_period: f64,
    /// Cooldown after any violation during which head and eye checks are
    /// suppressed.
    pub violation_grace_period: f64,
    pub head_movement_grace_period: f64,
    pub eye_movement_grace_period: f64,
    /// How long the head must stay straight before eye gaze is evaluated.
    pub face_alignment_stabilization_period: f64,
    /// Accepted band for face box area / frame area, inclusive.
    pub face_min_area_ratio: f64,
    pub face_max_area_ratio: f64,
    pub repeat_policy: RepeatPolicy,
    pub phone_detection_enabled: bool,
    pub phone_grace_period: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            test_duration_seconds: 600.0,
            max_violations: 5,
            no_face_grace_period: 3.0,
            multiple_faces_grace_period: 1.0,
            face_distance_grace_period: 3.0,
            violation_grace_period: 3.0,
            head_movement_grace_period: 2.0,
            eye_movement_grace_period: 2.0,
            face_alignment_stabilization_period: 5.0,
            face_min_area_ratio: 0.05,
            face_max_area_ratio: 0.40,
            repeat_policy: RepeatPolicy::Restart,
            phone_detection_enabled: false,
            phone_grace_period: 1.0,
        }
    }
}

impl SessionConfig {
    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("test_duration_seconds", self.test_duration_seconds),
            ("no_face_grace_period", self.no_face_grace_period),
            ("multiple_faces_grace_period", self.multiple_faces_grace_period),
            ("face_distance_grace_period", self.face_distance_grace_period),
            ("violation_grace_period", self.violation_grace_period),
            ("head_movement_grace_period", self.head_movement_grace_period),
            ("eye_movement_grace_period", self.eye_movement_grace_period),
            (
                "face_alignment_stabilization_period",
                self.face_alignment_stabilization_period,
            ),
            ("phone_grace_period", self.phone_grace_period),
        ];
        for (key, value) in durations {
            if try_secs(value).is_none() {
                return Err(ConfigError::InvalidDuration { key, value });
            }
        }
        if self.test_duration_seconds == 0.0 {
            return Err(ConfigError::ZeroTestDuration);
        }

        for (key, value) in [
            ("face_min_area_ratio", self.face_min_area_ratio),
            ("face_max_area_ratio", self.face_max_area_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RatioOutOfRange { key, value });
            }
        }
        if self.face_min_area_ratio > self.face_max_area_ratio {
            return Err(ConfigError::InvertedRatioBand {
                min: self.face_min_area_ratio,
                max: self.face_max_area_ratio,
            });
        }

        Ok(())
    }

    pub fn test_duration(&self) -> Duration {
        secs(self.test_duration_seconds)
    }

    pub fn violation_grace(&self) -> Duration {
        secs(self.violation_grace_period)
    }

    pub fn alignment_stabilization(&self) -> Duration {
        secs(self.face_alignment_stabilization_period)
    }
}
