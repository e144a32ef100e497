//! Unix domain socket server
//!
//! Accepts requests from the settings UI and the radio stack, marshals
//! user-toggle events onto the policy engine's dispatch queue, and
//! streams decision events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::connectivity::{ConnectivityController, RadioBridge};
use crate::events::{DecisionEvent, PolicyEvent};
use crate::settings::{keys, FileSettingsStore, SettingsStore};

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Everything a client handler needs, shared across connections.
pub struct ServerCtx {
    pub settings: FileSettingsStore,
    pub bridge: RadioBridge,
    pub policy_tx: mpsc::Sender<PolicyEvent>,
    pub decisions: broadcast::Sender<DecisionEvent>,
    pub policy_active: bool,
}

/// IPC server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    ctx: Arc<ServerCtx>,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the socket and prepare to serve
    pub fn new(socket_path: &Path, ctx: ServerCtx) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only: the socket accepts privileged control requests
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            ctx: Arc::new(ctx),
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let ctx = Arc::clone(&self.ctx);
                    let start_time = self.start_time;
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, ctx, start_time) => {
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

    /// Handle a single client connection
    async fn handle_client(
        mut stream: UnixStream,
        ctx: Arc<ServerCtx>,
        start_time: Instant,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;
            debug!(?request, "received request");

            let (response, subscribe) = Self::process_request(request, &ctx, start_time).await;
            Self::send_message(&mut stream, &response).await?;

            if subscribe {
                // The connection becomes a one-way event stream
                debug!("client subscribed to decision events");
                return Self::stream_decisions(stream, ctx.decisions.subscribe()).await;
            }
        }
    }

    /// Forward decision events to a subscribed client until it hangs up
    async fn stream_decisions(
        mut stream: UnixStream,
        mut rx: broadcast::Receiver<DecisionEvent>,
    ) -> Result<()> {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let note = Notification::Decision(event);
                    if Self::send_message(&mut stream, &note).await.is_err() {
                        debug!("subscriber disconnected");
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "decision event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Ok(());
                }
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request; returns (response, should_subscribe)
    async fn process_request(
        request: Request,
        ctx: &ServerCtx,
        start_time: Instant,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let status = DaemonStatus {
                    version: env!("CARGO_PKG_VERSION").to_owned(),
                    airplane_mode_on: ctx.settings.global_int(keys::AIRPLANE_MODE_ON, 0) == 1,
                    radio_on: ctx.bridge.is_radio_on(),
                    media_connected: ctx.bridge.is_media_connected(),
                    policy_active: ctx.policy_active,
                    uptime_secs: start_time.elapsed().as_secs(),
                };
                (Response::Status(status), false)
            }

            Request::SetAirplaneMode { on } => {
                info!(on, "airplane mode set via IPC");
                // The engine hears about this through the key watcher
                ctx.settings.set_global_int(keys::AIRPLANE_MODE_ON, on as i32);
                (Response::Ack, false)
            }

            Request::SetRadioPower { on } => {
                ctx.bridge.set_radio_power(on);
                (Response::Ack, false)
            }

            Request::SetMediaConnected { connected } => {
                ctx.bridge.set_media_connected(connected);
                (Response::Ack, false)
            }

            Request::NotifyRadioToggle { on } => {
                let event = PolicyEvent::UserToggledRadio { turned_on: on };
                match ctx.policy_tx.send(event).await {
                    Ok(()) => (Response::Ack, false),
                    Err(e) => {
                        error!(?e, "policy queue closed");
                        (
                            Response::Error {
                                code: "queue_closed".to_owned(),
                                message: "policy engine is not running".to_owned(),
                            },
                            false,
                        )
                    }
                }
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PrivilegeBroker;

    fn test_ctx() -> (ServerCtx, mpsc::Receiver<PolicyEvent>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = FileSettingsStore::load(
            &dir.path().join("settings.json"),
            PrivilegeBroker::default(),
        )
        .unwrap();
        let bridge = RadioBridge::new(settings.clone());
        let (policy_tx, policy_rx) = mpsc::channel(8);
        let (decisions, _) = broadcast::channel(8);

        let ctx = ServerCtx {
            settings,
            bridge,
            policy_tx,
            decisions,
            policy_active: true,
        };
        (ctx, policy_rx, dir)
    }

    #[tokio::test]
    async fn test_ping() {
        let (ctx, _rx, _dir) = test_ctx();
        let (resp, subscribe) =
            Server::process_request(Request::Ping, &ctx, Instant::now()).await;
        assert!(matches!(resp, Response::Pong));
        assert!(!subscribe);
    }

    #[tokio::test]
    async fn test_set_airplane_mode_writes_setting() {
        let (ctx, _rx, _dir) = test_ctx();
        let (resp, _) =
            Server::process_request(Request::SetAirplaneMode { on: true }, &ctx, Instant::now())
                .await;
        assert!(matches!(resp, Response::Ack));
        assert_eq!(ctx.settings.global_int(keys::AIRPLANE_MODE_ON, 0), 1);
    }

    #[tokio::test]
    async fn test_notify_radio_toggle_marshals_event() {
        let (ctx, mut rx, _dir) = test_ctx();
        let (resp, _) =
            Server::process_request(Request::NotifyRadioToggle { on: true }, &ctx, Instant::now())
                .await;
        assert!(matches!(resp, Response::Ack));
        assert_eq!(
            rx.recv().await,
            Some(PolicyEvent::UserToggledRadio { turned_on: true })
        );
    }

    #[tokio::test]
    async fn test_status_reflects_bridge_state() {
        let (ctx, _rx, _dir) = test_ctx();
        ctx.bridge.set_radio_power(true);
        ctx.bridge.set_media_connected(true);

        let (resp, _) = Server::process_request(Request::GetStatus, &ctx, Instant::now()).await;
        match resp {
            Response::Status(status) => {
                assert!(status.radio_on);
                assert!(status.media_connected);
                assert!(status.policy_active);
                assert!(!status.airplane_mode_on);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribe_flag() {
        let (ctx, _rx, _dir) = test_ctx();
        let (resp, subscribe) =
            Server::process_request(Request::Subscribe, &ctx, Instant::now()).await;
        assert!(matches!(resp, Response::Subscribed));
        assert!(subscribe);
    }
}
