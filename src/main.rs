//! signbridge-daemon: detection engine for camera-based sign language typing
//!
//! The daemon turns a noisy stream of per-frame classifier results into a
//! reliable stream of committed characters and commands:
//! - Throttled, single-flight capture/recognition loop against a remote
//!   HTTP classifier, with timeout and bounded retry/backoff
//! - Dwell-based debouncing of predictions into confirmed symbols
//! - Gesture interpretation: letters accumulate, a separator adds a space,
//!   a held commit gesture dispatches the buffer
//! - Unix-socket IPC for the companion app: status, commands, push events
//!
//! Camera capture, rendering, persistence, and the classifier itself live
//! outside this process.

mod capture;
mod config;
mod connectivity;
mod detector;
mod events;
mod gesture;
mod ipc;
mod lifecycle;
mod recognizer;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{FrameSource, StaticFrameSource};
use crate::config::Config;
use crate::detector::Detector;
use crate::gesture::Vocabulary;
use crate::ipc::{DetectorStatus, Server};
use crate::lifecycle::ShutdownSignal;
use crate::recognizer::RecognitionClient;

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
        "signbridge-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        backend = %config.backend_url,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    let client = Arc::new(RecognitionClient::new(
        config.backend_url.as_str(),
        config.tuning.request_timeout,
        config.tuning.max_attempts,
    )?);

    // Prefer the server's advertised vocabulary; fall back to the built-in
    // alphabet when the server is unreachable at startup.
    let vocabulary = match client.labels().await {
        Ok(labels) => {
            info!(classes = labels.len(), "symbol vocabulary loaded from server");
            Vocabulary::from_labels(labels)
        }
        Err(e) => {
            warn!(error = %e, "labels fetch failed, using built-in vocabulary");
            Vocabulary::default()
        }
    };

    // Frame acquisition is external; without a companion feed the daemon
    // runs against the stub source.
    let source: Arc<dyn FrameSource> = match &config.frame_file {
        Some(path) => Arc::new(StaticFrameSource::from_file(path)?),
        None => {
            info!("no frame file configured; capture cycles will idle until one is provided");
            Arc::new(StaticFrameSource::new(String::new()))
        }
    };

    // Create channels for inter-component communication
    // Detection engine -> IPC clients (event broadcast)
    let (event_tx, _event_rx) = broadcast::channel(64);
    // IPC server -> detector (commands)
    let (command_tx, command_rx) = mpsc::channel(32);
    // Live status snapshot shared with the IPC server
    let status = Arc::new(RwLock::new(DetectorStatus::default()));

    let detector = Detector::new(
        &config.tuning,
        vocabulary,
        Arc::clone(&client),
        source,
        event_tx.clone(),
        Arc::clone(&status),
    );

    let server = Server::new(&config.socket_path, command_tx, status, event_tx)?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the detection orchestrator (processes ticks and commands)
        _ = detector.run(command_rx) => {
            info!("detector loop exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("signbridge-daemon stopped");

    Ok(())
}
