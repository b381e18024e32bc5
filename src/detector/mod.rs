//! Panic trigger detection
//!
//! Owns the press window state:
//! - `press_count`: qualifying presses since the window opened
//! - `last_press_ms`: when the last qualifying press happened

mod press;

pub use press::{KeyDisposition, PanicDetector};
