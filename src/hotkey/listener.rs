//! Global key listener
//!
//! Owns the panic detector and runs it on a dedicated thread with its
//! own CFRunLoop. The tap callback decides synchronously whether a
//! volume press is swallowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use crate::detector::{KeyDisposition, PanicDetector};

/// Global key listener feeding volume-button presses to the detector
pub struct HotkeyListener {
    detector: Option<PanicDetector>,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new listener that will own `detector` once started
    pub fn new(detector: PanicDetector) -> Self {
        Self {
            detector: Some(detector),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the listener
    ///
    /// Moves the detector onto a dedicated thread that runs a CFRunLoop
    /// receiving CGEventTap callbacks. The listener runs until `stop()` is
    /// called or the program exits.
    pub fn start(&mut self) -> Result<(), HotkeyError> {
        if !cfg!(target_os = "macos") {
            return Err(HotkeyError::Unsupported);
        }

        let detector = self.detector.take().ok_or(HotkeyError::AlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_event_loop(detector, running.clone()) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop the listener; the run loop exits at its next poll
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global key events are not supported on this platform")]
    Unsupported,
}

/// How the tap answers the window server for one event
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TapResponse {
    /// Return the event unchanged
    Forward,
    /// Return null so the event never reaches default handling
    Drop,
}

impl From<KeyDisposition> for TapResponse {
    fn from(disposition: KeyDisposition) -> Self {
        if disposition.is_consumed() {
            TapResponse::Drop
        } else {
            TapResponse::Forward
        }
    }
}

#[cfg(target_os = "macos")]
fn run_event_loop(detector: PanicDetector, running: Arc<AtomicBool>) -> Result<(), HotkeyError> {
    super::tap::run_event_loop(detector, running)
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(_detector: PanicDetector, _running: Arc<AtomicBool>) -> Result<(), HotkeyError> {
    Err(HotkeyError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorSettings;
    use crate::hotkey::Key;
    use tokio::sync::broadcast;

    fn create_listener() -> HotkeyListener {
        let (tx, _rx) = broadcast::channel(4);
        HotkeyListener::new(PanicDetector::new(DetectorSettings::default(), tx))
    }

    #[test]
    fn test_listener_creation() {
        let listener = create_listener();
        assert!(!listener.is_running());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_unsupported_platform() {
        let mut listener = create_listener();
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());
    }

    #[test]
    fn test_consumed_press_is_dropped() {
        assert_eq!(TapResponse::from(KeyDisposition::Consumed), TapResponse::Drop);
        assert_eq!(
            TapResponse::from(KeyDisposition::PassThrough),
            TapResponse::Forward
        );
    }

    #[test]
    fn test_third_press_maps_to_drop() {
        let (tx, _rx) = broadcast::channel(8);
        let mut detector = PanicDetector::new(DetectorSettings::default(), tx);

        let responses: Vec<TapResponse> = [10_000, 10_300, 10_600]
            .into_iter()
            .map(|now_ms| TapResponse::from(detector.handle_key_down(Key::VolumeUp, now_ms)))
            .collect();

        assert_eq!(
            responses,
            vec![TapResponse::Forward, TapResponse::Forward, TapResponse::Drop]
        );
    }

    #[test]
    fn test_stop_clears_running() {
        let listener = create_listener();
        listener.running.store(true, Ordering::SeqCst);
        listener.stop();
        assert!(!listener.is_running());
    }
}
