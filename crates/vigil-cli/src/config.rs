use anyhow::{Context, Result};
use std::path::Path;
use vigil_core::{RepeatPolicy, SessionConfig};

/// Build the effective session configuration.
///
/// Layers, later wins: built-in defaults, the optional TOML file, then
/// `VIGIL_*` environment variables. Command-line overrides are applied by
/// the caller. The result is validated before it is returned.
pub fn load(path: Option<&Path>) -> Result<SessionConfig> {
    let base: SessionConfig = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => SessionConfig::default(),
    };

    let config = apply_env(base, |key| std::env::var(key).ok());
    config.validate().context("invalid session configuration")?;
    Ok(config)
}

/// Overlay `VIGIL_<KEY>` variables onto `config`. Unparseable values are
/// ignored and the previous layer's value is kept. Switches are off for
/// `0`, `false`, `no` or `off` (any case) and on for any other value.
pub fn apply_env(mut config: SessionConfig, var: impl Fn(&str) -> Option<String>) -> SessionConfig {
    let f64_var = |key: &str, default: f64| -> f64 {
        var(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };

    config.test_duration_seconds =
        f64_var("VIGIL_TEST_DURATION_SECONDS", config.test_duration_seconds);
    config.max_violations = var("VIGIL_MAX_VIOLATIONS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.max_violations);
    config.no_face_grace_period = f64_var("VIGIL_NO_FACE_GRACE_PERIOD", config.no_face_grace_period);
    config.multiple_faces_grace_period = f64_var(
        "VIGIL_MULTIPLE_FACES_GRACE_PERIOD",
        config.multiple_faces_grace_period,
    );
    config.face_distance_grace_period = f64_var(
        "VIGIL_FACE_DISTANCE_GRACE_PERIOD",
        config.face_distance_grace_period,
    );
    config.violation_grace_period =
        f64_var("VIGIL_VIOLATION_GRACE_PERIOD", config.violation_grace_period);
    config.head_movement_grace_period = f64_var(
        "VIGIL_HEAD_MOVEMENT_GRACE_PERIOD",
        config.head_movement_grace_period,
    );
    config.eye_movement_grace_period = f64_var(
        "VIGIL_EYE_MOVEMENT_GRACE_PERIOD",
        config.eye_movement_grace_period,
    );
    config.face_alignment_stabilization_period = f64_var(
        "VIGIL_FACE_ALIGNMENT_STABILIZATION_PERIOD",
        config.face_alignment_stabilization_period,
    );
    config.face_min_area_ratio = f64_var("VIGIL_FACE_MIN_AREA_RATIO", config.face_min_area_ratio);
    config.face_max_area_ratio = f64_var("VIGIL_FACE_MAX_AREA_RATIO", config.face_max_area_ratio);
    config.repeat_policy = match var("VIGIL_REPEAT_POLICY").as_deref() {
        Some("restart") => RepeatPolicy::Restart,
        Some("require-clear") => RepeatPolicy::RequireClear,
        _ => config.repeat_policy,
    };
    config.phone_detection_enabled = var("VIGIL_PHONE_DETECTION_ENABLED")
        .map(|v| switch_on(&v))
        .unwrap_or(config.phone_detection_enabled);
    config.phone_grace_period = f64_var("VIGIL_PHONE_GRACE_PERIOD", config.phone_grace_period);

    config
}

fn switch_on(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
