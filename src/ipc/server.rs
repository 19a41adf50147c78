//! Unix domain socket server for IPC
//!
//! Request-response communication plus push notifications of detection
//! events to subscribed clients. Each connection gets a dedicated writer
//! task so responses and notifications never interleave mid-frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{unix::OwnedReadHalf, UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use super::protocol::{DetectorStatus, Notification, Request, Response};
use crate::detector::Command;
use crate::events::DetectionEvent;

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    command_tx: mpsc::Sender<Command>,
    status: Arc<RwLock<DetectorStatus>>,
    event_tx: broadcast::Sender<DetectionEvent>,
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        command_tx: mpsc::Sender<Command>,
        status: Arc<RwLock<DetectorStatus>>,
        event_tx: broadcast::Sender<DetectionEvent>,
    ) -> Result<Self> {
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

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            command_tx,
            status,
            event_tx,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let command_tx = self.command_tx.clone();
                    let status = Arc::clone(&self.status);
                    let event_tx = self.event_tx.clone();
                    let start_time = self.start_time;
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, command_tx, status, event_tx, start_time) => {
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
        stream: UnixStream,
        command_tx: mpsc::Sender<Command>,
        status: Arc<RwLock<DetectorStatus>>,
        event_tx: broadcast::Sender<DetectionEvent>,
        start_time: Instant,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // One writer task per client keeps frames whole even when push
        // notifications and responses race.
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(32);
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if writer.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        let mut forwarder: Option<tokio::task::JoinHandle<()>> = None;
        let result =
            Self::serve_requests(&mut reader, &command_tx, &status, &event_tx, start_time, &out_tx, &mut forwarder)
                .await;

        if let Some(task) = forwarder {
            task.abort();
        }
        drop(out_tx);
        let _ = writer_task.await;

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn serve_requests(
        reader: &mut OwnedReadHalf,
        command_tx: &mpsc::Sender<Command>,
        status: &Arc<RwLock<DetectorStatus>>,
        event_tx: &broadcast::Sender<DetectionEvent>,
        start_time: Instant,
        out_tx: &mpsc::Sender<Vec<u8>>,
        forwarder: &mut Option<tokio::task::JoinHandle<()>>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;
            debug!(?request, "received request");

            let (response, subscribe) =
                Self::process_request(request, command_tx, status, start_time).await;

            if subscribe && forwarder.is_none() {
                debug!("client subscribed to notifications");
                *forwarder = Some(Self::spawn_event_forwarder(
                    event_tx.subscribe(),
                    out_tx.clone(),
                ));
            }

            let frame = Self::encode_frame(&response)?;
            if out_tx.send(frame).await.is_err() {
                return Ok(());
            }
        }
    }

    /// Forward detection events to a subscribed client
    fn spawn_event_forwarder(
        mut event_rx: broadcast::Receiver<DetectionEvent>,
        out_tx: mpsc::Sender<Vec<u8>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        let note = Notification::Event { event };
                        match Self::encode_frame(&note) {
                            Ok(frame) => {
                                if out_tx.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(?e, "failed to encode notification");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Encode a length-prefixed JSON message
    fn encode_frame<T: serde::Serialize>(msg: &T) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(msg)?;
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Process a request and return a response.
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        command_tx: &mpsc::Sender<Command>,
        status: &Arc<RwLock<DetectorStatus>>,
        start_time: Instant,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut snapshot = status.read().await.clone();
                snapshot.uptime_secs = start_time.elapsed().as_secs();
                (Response::Status(snapshot), false)
            }

            Request::Start => (
                Self::send_command(command_tx, |reply| Command::Start { reply }).await,
                false,
            ),

            Request::Stop { force } => (
                Self::send_command(command_tx, |reply| Command::Stop { force, reply }).await,
                false,
            ),

            Request::ClearBuffer => (
                Self::send_command(command_tx, |reply| Command::ClearBuffer { reply }).await,
                false,
            ),

            Request::SendBuffer => (
                Self::send_command(command_tx, |reply| Command::SendBuffer { reply }).await,
                false,
            ),

            Request::SetServerUrl { url } => (
                Self::send_command(command_tx, |reply| Command::SetServerUrl { url, reply }).await,
                false,
            ),

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Relay a command to the detector and translate the reply
    async fn send_command<F>(command_tx: &mpsc::Sender<Command>, build: F) -> Response
    where
        F: FnOnce(oneshot::Sender<Result<(), crate::detector::CommandError>>) -> Command,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        if command_tx.send(build(reply_tx)).await.is_err() {
            return Response::Error {
                code: "unavailable".to_string(),
                message: "detector is not running".to_string(),
            };
        }

        match reply_rx.await {
            Ok(Ok(())) => Response::Ack,
            Ok(Err(e)) => Response::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
            Err(_) => Response::Error {
                code: "unavailable".to_string(),
                message: "detector dropped the command".to_string(),
            },
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

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_length_prefix() {
        let frame = Server::encode_frame(&Response::Pong).unwrap();
        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);

        let decoded: Response = serde_json::from_slice(&frame[4..]).unwrap();
        assert!(matches!(decoded, Response::Pong));
    }

    #[test]
    fn test_get_status_fills_uptime() {
        tokio_test::block_on(async {
            let (command_tx, _command_rx) = mpsc::channel(1);
            let status = Arc::new(RwLock::new(DetectorStatus::default()));
            let start = Instant::now() - std::time::Duration::from_secs(5);

            let (response, subscribe) =
                Server::process_request(Request::GetStatus, &command_tx, &status, start).await;
            assert!(!subscribe);
            match response {
                Response::Status(s) => assert!(s.uptime_secs >= 5),
                other => panic!("unexpected response: {other:?}"),
            }
        });
    }

    #[tokio::test]
    async fn test_command_with_closed_detector_is_unavailable() {
        let (command_tx, command_rx) = mpsc::channel(1);
        drop(command_rx);
        let status = Arc::new(RwLock::new(DetectorStatus::default()));

        let (response, _) =
            Server::process_request(Request::Start, &command_tx, &status, Instant::now()).await;
        assert!(matches!(response, Response::Error { code, .. } if code == "unavailable"));
    }
}
