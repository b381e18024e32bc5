//! Unix domain socket server for the method channel
//!
//! Each connection is an attached application. Inbound calls are answered
//! synchronously; outbound calls from `MethodChannel` are delivered to every
//! connection and their results logged as they arrive.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::DetectorSettings;
use crate::events::PanicEvent;

use super::codec::{read_frame, write_frame, FrameError};
use super::invoke::{MethodChannel, OutboundCall, PendingCalls};
use super::protocol::{
    DaemonStatus, Message, MethodResult, GET_STATUS, PANIC_TRIGGERED, SOME_NATIVE_CALL,
};

/// Method channel server handling application connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    channel: MethodChannel,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
pub(crate) struct ServerState {
    status: DaemonStatus,
    start_time: Instant,
}

impl ServerState {
    pub(crate) fn new(settings: DetectorSettings) -> Self {
        Self {
            status: DaemonStatus {
                press_threshold: settings.threshold,
                press_window_ms: settings.window.as_millis() as u64,
                ..DaemonStatus::default()
            },
            start_time: Instant::now(),
        }
    }
}

impl Server {
    /// Create a new server bound to `socket_path`
    pub fn new(socket_path: &Path, settings: DetectorSettings) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "method channel listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state: Arc::new(RwLock::new(ServerState::new(settings))),
            channel: MethodChannel::new(16),
            shutdown_tx,
        })
    }

    /// Record whether the global key listener is active
    pub async fn set_hotkey_registered(&self, registered: bool) {
        self.state.write().await.status.hotkey_registered = registered;
    }

    /// Fold a detector event into the reported status
    pub async fn record_event(&self, event: &PanicEvent) {
        let mut state = self.state.write().await;
        match event {
            PanicEvent::PressCounted { count } => {
                state.status.press_count = *count;
            }
            PanicEvent::PanicTriggered { source } => {
                state.status.panic_count += 1;
                state.status.last_panic_source = Some(*source);
                state.status.press_count = 0;
                info!(%source, total = state.status.panic_count, "panic recorded");
            }
        }
    }

    /// Fold detector events into status and send each panic to applications
    ///
    /// Returns once every event sender is gone.
    pub async fn forward_events(&self, mut events: broadcast::Receiver<PanicEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.record_event(&event).await;
                    if let PanicEvent::PanicTriggered { source } = event {
                        info!(
                            %source,
                            attached = self.channel.attached(),
                            "sending panic to applications"
                        );
                        self.channel.invoke_method(PANIC_TRIGGERED, Value::Null);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "panic event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return;
                }
            }
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("application attached");
                    let state = Arc::clone(&self.state);
                    let calls = self.channel.subscribe();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, state, calls) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("method channel shutdown complete");
    }
}

/// Serve one attached application until it disconnects
pub(crate) async fn handle_client<S>(
    stream: S,
    state: Arc<RwLock<ServerState>>,
    mut calls: broadcast::Receiver<OutboundCall>,
) -> Result<(), FrameError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);

    // Frames are decoded on their own task; the select below must only
    // await cancel-safe receives.
    let (frame_tx, mut frame_rx) = mpsc::channel::<Message>(16);
    let reader_task = tokio::spawn(read_messages(reader, frame_tx));

    let mut pending = PendingCalls::new();

    let result = loop {
        tokio::select! {
            frame = frame_rx.recv() => match frame {
                Some(Message::MethodCall { id, method, arguments }) => {
                    debug!(id, method = %method, "received call from application");
                    let result = process_call(&method, &arguments, &state).await;
                    let reply = Message::MethodResult { id, result };
                    if let Err(e) = write_frame(&mut writer, &reply).await {
                        break Err(e);
                    }
                }
                Some(Message::MethodResult { id, result }) => {
                    pending.complete(id, &result);
                }
                None => {
                    debug!("application detached");
                    break Ok(());
                }
            },
            call = calls.recv() => match call {
                Ok(call) => {
                    let id = pending.register(&call.method);
                    let message = Message::MethodCall {
                        id,
                        method: call.method,
                        arguments: call.arguments,
                    };
                    if let Err(e) = write_frame(&mut writer, &message).await {
                        break Err(e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "outbound calls dropped for slow application");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break Ok(());
                }
            },
        }
    };

    reader_task.abort();
    pending.abandon_all();
    result
}

/// Decode frames from the application and forward them to the connection loop
async fn read_messages<S>(mut reader: ReadHalf<S>, frame_tx: mpsc::Sender<Message>)
where
    S: AsyncRead + AsyncWrite,
{
    loop {
        let body = match read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => return,
            Err(e) => {
                warn!(?e, "failed to read frame, disconnecting");
                return;
            }
        };

        match serde_json::from_slice::<Message>(&body) {
            Ok(message) => {
                if frame_tx.send(message).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(?e, "skipping malformed frame");
            }
        }
    }
}

/// Answer an inbound call from the application
pub(crate) async fn process_call(
    method: &str,
    arguments: &Value,
    state: &RwLock<ServerState>,
) -> MethodResult {
    match method {
        SOME_NATIVE_CALL => {
            let data = match arguments.get("data") {
                Some(Value::String(data)) => data.as_str(),
                _ => "null",
            };
            debug!(data, "someNativeCall");
            MethodResult::success(format!("Native side processed: {data}"))
        }

        GET_STATUS => {
            let mut state = state.write().await;
            state.status.uptime_secs = state.start_time.elapsed().as_secs();
            match serde_json::to_value(&state.status) {
                Ok(value) => MethodResult::success(value),
                Err(e) => MethodResult::Error {
                    code: "status_unavailable".to_string(),
                    message: Some(e.to_string()),
                    details: Value::Null,
                },
            }
        }

        other => {
            debug!(method = other, "no handler for method");
            MethodResult::NotImplemented
        }
    }
}
