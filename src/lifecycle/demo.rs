//! One-shot demo trigger
//!
//! Fires a single panic after a fixed delay, regardless of button state.
//! Only spawned when explicitly enabled in configuration.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::events::{PanicEvent, PanicSource};

/// Emit a demo panic once `delay` has elapsed
pub fn spawn_demo_trigger(delay: Duration, event_tx: broadcast::Sender<PanicEvent>) -> JoinHandle<()> {
    info!(delay_ms = delay.as_millis() as u64, "demo trigger armed");

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!("demo: simulating panic trigger");
        let _ = event_tx.send(PanicEvent::PanicTriggered {
            source: PanicSource::Demo,
        });
    })
}
