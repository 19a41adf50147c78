//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::connectivity::ConnectivityStatus;
use crate::detector::Reading;
use crate::events::DetectionEvent;

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request the current detector status
    GetStatus,

    /// Begin the capture/recognition loop
    Start,

    /// Stop the loop. Refused while a commit hold is past the guard
    /// threshold unless `force` is set.
    Stop {
        #[serde(default)]
        force: bool,
    },

    /// Clear the accumulated buffer
    ClearBuffer,

    /// Dispatch the accumulated buffer immediately
    SendBuffer,

    /// Point the daemon at a different recognition server
    SetServerUrl { url: String },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to detection event notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current detector status
    Status(DetectorStatus),

    /// Command accepted
    Ack,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A detection event occurred
    Event { event: DetectionEvent },
}

/// Full detector status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorStatus {
    /// Daemon version
    pub version: String,

    /// Whether the capture loop is running
    pub running: bool,

    /// Most recent cycle's reading
    pub reading: Reading,

    /// Accumulated buffer contents
    pub buffer: String,

    /// Reachability of the recognition server
    pub connectivity: ConnectivityStatus,

    /// Recognition cycles applied this run
    pub frames_processed: u64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DetectorStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            running: false,
            reading: Reading::Idle,
            buffer: String::new(),
            connectivity: ConnectivityStatus::Connecting,
            frames_processed: 0,
            uptime_secs: 0,
        }
    }
}
