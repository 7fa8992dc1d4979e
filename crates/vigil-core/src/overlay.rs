use crate::detection::Frame;

/// Where a line of overlay text goes, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPosition {
    pub x: u32,
    pub y: u32,
}

impl OverlayPosition {
    /// Left-aligned line at the standard margin.
    pub const fn line(y: u32) -> Self {
        Self { x: 30, y }
    }
}

pub const TIME_LEFT: OverlayPosition = OverlayPosition::line(40);
pub const VIOLATIONS: OverlayPosition = OverlayPosition::line(80);
pub const ALIGNMENT: OverlayPosition = OverlayPosition::line(120);

/// Draws status text for the candidate. Fire-and-forget.
pub trait Overlay: Send {
    fn draw(&mut self, frame: &Frame, text: &str, position: OverlayPosition);

    /// Called once after all lines for a frame have been drawn.
    fn present(&mut self, _frame: &Frame) {}
}

/// Discards everything; for headless runs.
#[derive(Debug, Default)]
pub struct NullOverlay;

impl Overlay for NullOverlay {
    fn draw(&mut self, _frame: &Frame, _text: &str, _position: OverlayPosition) {}
}
