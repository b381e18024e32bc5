//! SIGTERM/SIGINT handling for a graceful stop

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Resolves once the daemon is asked to stop
pub struct ShutdownSignal;

impl ShutdownSignal {
    pub fn new() -> Self {
        Self
    }

    /// Register SIGTERM and SIGINT handlers and wait for either
    ///
    /// Returns the name of the signal received. Fails only if a handler
    /// cannot be registered, in which case no signal will be observed.
    pub async fn wait(&self) -> std::io::Result<&'static str> {
        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;

        let name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        debug!(signal = name, "shutdown signal received");

        Ok(name)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_stays_pending_without_signal() {
        let shutdown = ShutdownSignal::default();
        let waited = tokio::time::timeout(Duration::from_millis(20), shutdown.wait()).await;
        assert!(waited.is_err());
    }
}
