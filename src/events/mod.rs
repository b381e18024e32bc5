//! Events module for panic detection
//!
//! Provides structured event types emitted by the press detector and
//! the demo trigger.

use serde::{Deserialize, Serialize};

/// What caused a panic to be triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanicSource {
    /// Volume buttons pressed rapidly enough to cross the threshold
    Buttons,
    /// One-shot demo timer
    Demo,
}

impl std::fmt::Display for PanicSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanicSource::Buttons => write!(f, "buttons"),
            PanicSource::Demo => write!(f, "demo"),
        }
    }
}

/// Events emitted by the detector and the demo trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanicEvent {
    /// A qualifying press was counted
    PressCounted {
        /// Presses in the current window, including this one
        count: u32,
    },

    /// The panic signal should be sent to the application
    PanicTriggered { source: PanicSource },
}

impl std::fmt::Display for PanicEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanicEvent::PressCounted { count } => write!(f, "PRESS_COUNTED ({})", count),
            PanicEvent::PanicTriggered { source } => write!(f, "PANIC_TRIGGERED ({})", source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PanicEvent::PanicTriggered {
            source: PanicSource::Buttons,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("panic_triggered"));
        assert!(json.contains("buttons"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"press_counted","count":2}"#;
        let event: PanicEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, PanicEvent::PressCounted { count: 2 });
    }

    #[test]
    fn test_event_display() {
        let event = PanicEvent::PanicTriggered {
            source: PanicSource::Demo,
        };
        assert_eq!(event.to_string(), "PANIC_TRIGGERED (demo)");
    }
}
