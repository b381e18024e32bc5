//! Hotkey module for global keyboard event listening
//!
//! Uses macOS CGEventTap to observe key-down and media-key events, feed
//! volume-button presses into the panic detector and swallow the press
//! that triggers it.

// Key decoding is only reached from the macOS tap outside of tests
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
mod keys;
mod listener;
#[cfg(target_os = "macos")]
mod tap;

pub use keys::Key;
pub use listener::{HotkeyError, HotkeyListener};
