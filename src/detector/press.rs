//! Press-count state machine
//!
//! Counts qualifying key presses inside a sliding window and signals a
//! panic once the threshold is reached.

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::DetectorSettings;
use crate::events::{PanicEvent, PanicSource};
use crate::hotkey::Key;

/// What the event source should do with a key-down event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Swallow the event; default handling must not see it
    Consumed,
    /// Hand the event on to default handling
    PassThrough,
}

impl KeyDisposition {
    pub fn is_consumed(&self) -> bool {
        matches!(self, KeyDisposition::Consumed)
    }
}

/// Detects rapid volume-button presses
pub struct PanicDetector {
    settings: DetectorSettings,
    /// Qualifying presses in the current window
    press_count: u32,
    /// Monotonic time of the last qualifying press, in milliseconds
    last_press_ms: u64,
    /// Channel for emitting detector events
    event_tx: broadcast::Sender<PanicEvent>,
}

impl PanicDetector {
    /// Create a new detector with an empty window
    pub fn new(settings: DetectorSettings, event_tx: broadcast::Sender<PanicEvent>) -> Self {
        Self {
            settings,
            press_count: 0,
            last_press_ms: 0,
            event_tx,
        }
    }

    #[cfg(test)]
    pub fn press_count(&self) -> u32 {
        self.press_count
    }

    #[cfg(test)]
    pub fn last_press_ms(&self) -> u64 {
        self.last_press_ms
    }

    /// Handle a key-down event observed at `now_ms`
    pub fn handle_key_down(&mut self, key: Key, now_ms: u64) -> KeyDisposition {
        if !key.is_qualifying() {
            return KeyDisposition::PassThrough;
        }

        let window_ms = self.settings.window.as_millis() as u64;
        if now_ms.saturating_sub(self.last_press_ms) > window_ms {
            self.press_count = 0;
        }

        self.press_count += 1;
        self.last_press_ms = now_ms;

        debug!(?key, count = self.press_count, "volume button pressed");
        let _ = self.event_tx.send(PanicEvent::PressCounted {
            count: self.press_count,
        });

        if self.press_count >= self.settings.threshold {
            info!(
                threshold = self.settings.threshold,
                "panic threshold reached, triggering panic"
            );
            let _ = self.event_tx.send(PanicEvent::PanicTriggered {
                source: PanicSource::Buttons,
            });
            self.press_count = 0;
            return KeyDisposition::Consumed;
        }

        KeyDisposition::PassThrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_detector() -> (PanicDetector, broadcast::Receiver<PanicEvent>) {
        let (tx, rx) = broadcast::channel(64);
        (PanicDetector::new(DetectorSettings::default(), tx), rx)
    }

    fn panics(rx: &mut broadcast::Receiver<PanicEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PanicEvent::PanicTriggered { .. }) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn test_initial_state() {
        let (detector, _) = create_detector();
        assert_eq!(detector.press_count(), 0);
        assert_eq!(detector.last_press_ms(), 0);
    }

    #[test]
    fn test_three_quick_presses_trigger_once() {
        let (mut detector, mut rx) = create_detector();

        assert_eq!(
            detector.handle_key_down(Key::VolumeDown, 10_000),
            KeyDisposition::PassThrough
        );
        assert_eq!(
            detector.handle_key_down(Key::VolumeDown, 10_500),
            KeyDisposition::PassThrough
        );
        assert_eq!(
            detector.handle_key_down(Key::VolumeDown, 11_000),
            KeyDisposition::Consumed
        );

        assert_eq!(detector.press_count(), 0);
        assert_eq!(panics(&mut rx), 1);
    }

    #[test]
    fn test_silence_resets_window() {
        let (mut detector, mut rx) = create_detector();

        detector.handle_key_down(Key::VolumeUp, 10_000);
        detector.handle_key_down(Key::VolumeUp, 10_100);
        assert_eq!(detector.press_count(), 2);

        let disposition = detector.handle_key_down(Key::VolumeDown, 12_200);
        assert_eq!(disposition, KeyDisposition::PassThrough);
        assert_eq!(detector.press_count(), 1);
        assert_eq!(panics(&mut rx), 0);
    }

    #[test]
    fn test_press_at_window_boundary_still_counts() {
        let (mut detector, mut rx) = create_detector();

        detector.handle_key_down(Key::VolumeUp, 10_000);
        detector.handle_key_down(Key::VolumeUp, 12_000);
        let disposition = detector.handle_key_down(Key::VolumeUp, 14_000);

        assert!(disposition.is_consumed());
        assert_eq!(panics(&mut rx), 1);
    }

    #[test]
    fn test_one_past_boundary_resets() {
        let (mut detector, _) = create_detector();

        detector.handle_key_down(Key::VolumeUp, 10_000);
        detector.handle_key_down(Key::VolumeUp, 12_001);
        assert_eq!(detector.press_count(), 1);
        assert_eq!(detector.last_press_ms(), 12_001);
    }

    #[test]
    fn test_alternating_keys_share_counter() {
        let (mut detector, mut rx) = create_detector();

        detector.handle_key_down(Key::VolumeUp, 10_000);
        detector.handle_key_down(Key::VolumeDown, 10_200);
        let disposition = detector.handle_key_down(Key::VolumeUp, 10_400);

        assert!(disposition.is_consumed());
        assert_eq!(panics(&mut rx), 1);
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let (mut detector, mut rx) = create_detector();

        detector.handle_key_down(Key::VolumeUp, 10_000);
        let before = (detector.press_count(), detector.last_press_ms());

        for code in [0u16, 0x24, 0x4A] {
            let disposition = detector.handle_key_down(Key::Other(code), 10_050);
            assert_eq!(disposition, KeyDisposition::PassThrough);
        }

        assert_eq!((detector.press_count(), detector.last_press_ms()), before);
        assert!(matches!(
            rx.try_recv(),
            Ok(PanicEvent::PressCounted { count: 1 })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fires_once_per_threshold() {
        let (mut detector, mut rx) = create_detector();
        let mut consumed = 0;

        for i in 0..30u64 {
            let disposition = detector.handle_key_down(Key::VolumeDown, 10_000 + i * 1_999);
            if disposition.is_consumed() {
                consumed += 1;
                assert_eq!(detector.press_count(), 0);
            }
        }

        assert_eq!(consumed, 10);
        assert_eq!(panics(&mut rx), 10);
    }

    #[test]
    fn test_custom_threshold() {
        let (tx, mut rx) = broadcast::channel(16);
        let settings = DetectorSettings {
            threshold: 1,
            window: std::time::Duration::from_millis(500),
        };
        let mut detector = PanicDetector::new(settings, tx);

        assert!(detector.handle_key_down(Key::VolumeUp, 100).is_consumed());
        assert!(detector.handle_key_down(Key::VolumeUp, 5_000).is_consumed());
        assert_eq!(panics(&mut rx), 2);
    }

    #[test]
    fn test_works_without_subscribers() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let mut detector = PanicDetector::new(DetectorSettings::default(), tx);

        detector.handle_key_down(Key::VolumeUp, 10_000);
        detector.handle_key_down(Key::VolumeUp, 10_001);
        assert!(detector.handle_key_down(Key::VolumeUp, 10_002).is_consumed());
    }
}
