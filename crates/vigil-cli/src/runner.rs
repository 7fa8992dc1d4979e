use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::oneshot;
use vigil_core::{
    AlignmentClassifier, Detectors, DistanceValidator, EyePositionGaze, FrameSource,
    FrameSourceError, GazeClassifier, Overlay, PhoneDetector, Session, SessionConfig,
    SessionSummary,
};
use vigil_hw::{ImageDirSource, Paced, ReplayDetections, ReplayLog, ReplaySource};

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("frame source error: {0}")]
    Source(#[from] FrameSourceError),
    #[error("detection log {0} contains no frames")]
    EmptyLog(PathBuf),
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("session thread exited")]
    ChannelClosed,
}

/// Where gaze answers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeInput {
    /// The `gaze_suspicious` flag recorded in the detection log.
    Recorded,
    /// Eye positions from the recorded landmarks.
    Landmarks,
}

/// Everything needed to start one session.
pub struct SessionPlan {
    pub config: SessionConfig,
    pub detections: PathBuf,
    pub frames: Option<PathBuf>,
    pub fps: f64,
    pub mirror: bool,
    pub realtime: bool,
    pub alignment: Box<dyn AlignmentClassifier>,
    pub gaze: GazeInput,
    pub overlay: Box<dyn Overlay>,
}

/// Handle to a session running on its own thread.
pub struct SessionHandle {
    abort: Arc<AtomicBool>,
    done: oneshot::Receiver<Result<SessionSummary, FrameSourceError>>,
}

impl SessionHandle {
    /// Wait for the session to end. Ctrl-C asks the session to stop before
    /// its next frame.
    pub async fn wait(mut self) -> Result<SessionSummary, RunnerError> {
        let finished = tokio::select! {
            result = &mut self.done => Some(result),
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => {
                        tracing::info!("abort requested");
                        self.abort.store(true, Ordering::SeqCst);
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
                }
                None
            }
        };

        let result = match finished {
            Some(result) => result,
            None => self.done.await,
        };
        let summary = result.map_err(|_| RunnerError::ChannelClosed)??;
        Ok(summary)
    }
}

/// Load the inputs, build the detector set and start the session on a
/// dedicated OS thread. Fails fast if any input cannot be opened.
pub fn spawn_session(plan: SessionPlan) -> Result<SessionHandle, RunnerError> {
    let base = Instant::now();

    let log = Arc::new(ReplayLog::load(&plan.detections)?);
    if log.is_empty() {
        return Err(RunnerError::EmptyLog(plan.detections));
    }

    let source: Box<dyn FrameSource> = match &plan.frames {
        Some(dir) => {
            let images = ImageDirSource::open(dir, plan.fps, base)?.mirrored(plan.mirror);
            if images.len() != log.len() {
                tracing::warn!(
                    images = images.len(),
                    records = log.len(),
                    "frame count differs from detection log; unmatched frames will be skipped"
                );
            }
            pace(images, plan.realtime)
        }
        None => pace(ReplaySource::new(log.clone(), base), plan.realtime),
    };

    let replay = ReplayDetections::new(log);
    let gaze: Box<dyn GazeClassifier> = match plan.gaze {
        GazeInput::Recorded => Box::new(replay.clone()),
        GazeInput::Landmarks => Box::new(EyePositionGaze::default()),
    };
    let phone: Option<Box<dyn PhoneDetector>> = plan
        .config
        .phone_detection_enabled
        .then(|| Box::new(replay.clone()) as Box<dyn PhoneDetector>);

    let detectors = Detectors {
        faces: Box::new(replay.clone()),
        landmarks: Box::new(replay),
        alignment: plan.alignment,
        gaze,
        phone,
        distance: DistanceValidator::new(
            plan.config.face_min_area_ratio,
            plan.config.face_max_area_ratio,
        ),
    };

    let session = Session::new(&plan.config, source, detectors, plan.overlay, base);
    let abort = Arc::new(AtomicBool::new(false));
    let (tx, rx) = oneshot::channel();

    let thread_abort = abort.clone();
    std::thread::Builder::new()
        .name("vigil-session".into())
        .spawn(move || {
            tracing::debug!("session thread started");
            let result = session.run(&thread_abort);
            let _ = tx.send(result);
            tracing::debug!("session thread exiting");
        })
        .map_err(RunnerError::Spawn)?;

    Ok(SessionHandle { abort, done: rx })
}

fn pace<S: FrameSource + 'static>(source: S, realtime: bool) -> Box<dyn FrameSource> {
    if realtime {
        Box::new(Paced::new(source))
    } else {
        Box::new(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{BoxCenteringAlignment, EndReason, NullOverlay, ViolationKind};

    fn write_log(tag: &str, lines: &[String]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vigil-cli-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("detections.jsonl");
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn plan(detections: PathBuf, config: SessionConfig) -> SessionPlan {
        SessionPlan {
            config,
            detections,
            frames: None,
            fps: 30.0,
            mirror: false,
            realtime: false,
            alignment: Box::new(BoxCenteringAlignment::default()),
            gaze: GazeInput::Recorded,
            overlay: Box::new(NullOverlay),
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_replay_runs_to_end_of_log() {
        // 4 s with no face at 10 fps
        let lines: Vec<String> = (0..40)
            .map(|i| format!("{{\"t\": {:.1}, \"width\": 640, \"height\": 480}}", i as f64 / 10.0))
            .collect();
        let path = write_log("replay", &lines);
        let config = SessionConfig {
            no_face_grace_period: 1.5,
            ..Default::default()
        };

        let handle = spawn_session(plan(path.clone(), config)).unwrap();
        let summary = runtime().block_on(handle.wait()).unwrap();

        assert_eq!(summary.end_reason, EndReason::SourceExhausted);
        assert_eq!(summary.frames_processed, 40);
        // fires at 1.5 s and 3.0 s
        assert_eq!(summary.total_violations, 2);
        assert!(summary
            .violations
            .iter()
            .all(|v| v.kind == ViolationKind::NoFace));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_empty_log_is_rejected() {
        let path = write_log("empty", &["# nothing recorded".to_string()]);
        let err = spawn_session(plan(path.clone(), SessionConfig::default()))
            .err()
            .unwrap();
        assert!(matches!(err, RunnerError::EmptyLog(_)));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_log_is_source_error() {
        let path = std::env::temp_dir().join("vigil-cli-test-no-such-log.jsonl");
        let err = spawn_session(plan(path, SessionConfig::default()))
            .err()
            .unwrap();
        assert!(matches!(err, RunnerError::Source(FrameSourceError::Io { .. })));
    }
}
