use std::time::Instant;

use vigil_core::{Frame, FrameSource, FrameSourceError};

/// Holds each frame back until its capture instant, so recorded input
/// plays at the speed it was captured.
pub struct Paced<S> {
    inner: S,
}

impl<S: FrameSource> Paced<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: FrameSource> FrameSource for Paced<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let frame = self.inner.next_frame()?;
        if let Some(frame) = &frame {
            let wait = frame.captured_at.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }
        Ok(frame)
    }
}
