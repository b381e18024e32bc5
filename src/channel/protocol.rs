//! Method channel message definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.
//! Both sides may issue calls; every call is answered by a result carrying
//! the same id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::PanicSource;

/// Outbound method sent to the application when a panic is triggered
pub const PANIC_TRIGGERED: &str = "panicTriggered";

/// Inbound echo handshake
pub const SOME_NATIVE_CALL: &str = "someNativeCall";

/// Inbound status query
pub const GET_STATUS: &str = "getStatus";

/// A single frame on the method channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Invoke a method on the other side
    MethodCall {
        id: u64,
        method: String,
        #[serde(default)]
        arguments: Value,
    },

    /// Completion of an earlier call
    MethodResult { id: u64, result: MethodResult },
}

/// The three ways a method call can complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResult {
    /// Handled, with an arbitrary response value
    Success {
        #[serde(default)]
        value: Value,
    },

    /// Handled, but failed
    Error {
        code: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        details: Value,
    },

    /// The receiver has no handler for this method
    NotImplemented,
}

impl MethodResult {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the global key listener is registered
    pub hotkey_registered: bool,

    /// Panics triggered since start
    pub panic_count: u64,

    /// What caused the most recent panic
    pub last_panic_source: Option<PanicSource>,

    /// Presses in the detector's current window, as last reported
    pub press_count: u32,

    /// Presses needed to trigger a panic
    pub press_threshold: u32,

    /// Press window in milliseconds
    pub press_window_ms: u64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hotkey_registered: false,
            panic_count: 0,
            last_panic_source: None,
            press_count: 0,
            press_threshold: 0,
            press_window_ms: 0,
            uptime_secs: 0,
        }
    }
}
