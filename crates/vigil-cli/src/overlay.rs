use std::io::Write;
use vigil_core::{Frame, Overlay, OverlayPosition};

/// Single status line on stderr, redrawn in place when it changes.
#[derive(Default)]
pub struct TerminalOverlay {
    pending: Vec<(OverlayPosition, String)>,
    last: String,
}

impl TerminalOverlay {
    fn compose(&mut self) -> String {
        self.pending.sort_by_key(|(pos, _)| (pos.y, pos.x));
        let line = self
            .pending
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("  |  ");
        self.pending.clear();
        line
    }
}

impl Overlay for TerminalOverlay {
    fn draw(&mut self, _frame: &Frame, text: &str, position: OverlayPosition) {
        self.pending.push((position, text.to_string()));
    }

    fn present(&mut self, _frame: &Frame) {
        let line = self.compose();
        if line == self.last {
            return;
        }
        let mut err = std::io::stderr().lock();
        // Clear to end of line so a shorter status does not leave residue
        let _ = write!(err, "\r{line}\x1b[K");
        let _ = err.flush();
        self.last = line;
    }
}

impl Drop for TerminalOverlay {
    fn drop(&mut self) {
        if !self.last.is_empty() {
            eprintln!();
        }
    }
}

/// Overlay text as debug events, for headless or logged runs.
#[derive(Default)]
pub struct LogOverlay;

impl Overlay for LogOverlay {
    fn draw(&mut self, frame: &Frame, text: &str, position: OverlayPosition) {
        tracing::debug!(frame = frame.sequence, y = position.y, text, "overlay");
    }
}
