//! panic-trigger-daemon: Background daemon that turns volume-button presses
//! into a panic signal
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Global volume-button detection via CGEventTap
//! - A press-count detector with a sliding window
//! - A method channel over a Unix socket for attached applications
//!
//! Pressing volume up or down three times within two seconds sends
//! `panicTriggered` to every attached application and swallows the
//! third press.

mod channel;
mod config;
mod detector;
mod events;
mod hotkey;
mod lifecycle;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::channel::Server;
use crate::config::Config;
use crate::detector::PanicDetector;
use crate::events::PanicEvent;
use crate::hotkey::HotkeyListener;
use crate::lifecycle::{spawn_demo_trigger, ShutdownSignal};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "panic-trigger-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        threshold = config.detector.threshold,
        window_ms = config.detector.window.as_millis() as u64,
        demo = config.demo_delay.is_some(),
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Detector and demo trigger -> method channel
    let (event_tx, event_rx) = broadcast::channel::<PanicEvent>(64);

    // The listener thread owns the detector from here on
    let detector = PanicDetector::new(config.detector, event_tx.clone());
    let mut hotkey_listener = HotkeyListener::new(detector);

    let server = Server::new(&config.socket_path, config.detector)?;

    match hotkey_listener.start() {
        Ok(()) => {
            info!("hotkey listener started");
            server
                .set_hotkey_registered(hotkey_listener.is_running())
                .await;
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without volume-button support - check Accessibility permissions");
        }
    }

    if let Some(delay) = config.demo_delay {
        spawn_demo_trigger(delay, event_tx.clone());
    }

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the method channel server (accepts application connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "method channel server error");
            }
        }

        // Forward panics to attached applications
        _ = server.forward_events(event_rx) => {
            info!("panic event handler exited");
        }

        // Wait for shutdown signal
        result = shutdown.wait() => {
            match result {
                Ok(signal) => info!(signal, "shutdown signal received"),
                Err(e) => error!(?e, "failed to register signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    hotkey_listener.stop();
    server.shutdown().await;

    info!("panic-trigger-daemon stopped");

    Ok(())
}
