//! Spinner animation frames for the TUI

/// Braille-style dots
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner frame for a frame counter that the model advances once per tick.
pub fn frame(index: usize) -> &'static str {
    SPINNER_FRAMES[index % SPINNER_FRAMES.len()]
}

/// Next frame counter, wrapping at the frame count.
pub fn advance(index: usize) -> usize {
    (index + 1) % SPINNER_FRAMES.len()
}
