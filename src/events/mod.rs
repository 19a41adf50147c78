//! Events emitted by the detection engine
//!
//! Structured event types for symbol confirmations, buffer changes,
//! commit-hold progress, and connectivity transitions. Broadcast to
//! subscribed IPC clients.

use serde::{Deserialize, Serialize};

use crate::connectivity::ConnectivityStatus;

/// Events emitted by the detection engine as state changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionEvent {
    /// The capture/recognition loop started ticking
    DetectionStarted,

    /// The loop stopped
    DetectionStopped {
        /// Number of recognition cycles applied during the run
        frames_processed: u64,
    },

    /// A symbol was held steadily long enough to be confirmed
    SymbolConfirmed { symbol: String },

    /// The accumulated buffer changed
    BufferUpdated { text: String },

    /// The buffer was cleared by a manual action
    BufferCleared,

    /// Commit-hold progress, 0.0 to 1.0
    CommitProgress { progress: f32 },

    /// The commit gesture was held to completion
    CommitCompleted { phrase: String },

    /// The phrase pipeline (completion + speech) finished
    PhraseFinished {
        original: String,
        /// Completed text, if the completion call succeeded
        completed: Option<String>,
    },

    /// A commit fired with an empty buffer
    NothingToSend,

    /// Network reachability changed
    ConnectivityChanged { status: ConnectivityStatus },
}

impl std::fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionEvent::DetectionStarted => write!(f, "DETECTION_STARTED"),
            DetectionEvent::DetectionStopped { frames_processed } => {
                write!(f, "DETECTION_STOPPED ({frames_processed} frames)")
            }
            DetectionEvent::SymbolConfirmed { symbol } => {
                write!(f, "SYMBOL_CONFIRMED ({symbol})")
            }
            DetectionEvent::BufferUpdated { text } => {
                write!(f, "BUFFER_UPDATED ({} chars)", text.len())
            }
            DetectionEvent::BufferCleared => write!(f, "BUFFER_CLEARED"),
            DetectionEvent::CommitProgress { progress } => {
                write!(f, "COMMIT_PROGRESS ({:.0}%)", progress * 100.0)
            }
            DetectionEvent::CommitCompleted { phrase } => {
                write!(f, "COMMIT_COMPLETED ({phrase})")
            }
            DetectionEvent::PhraseFinished { original, .. } => {
                write!(f, "PHRASE_FINISHED ({original})")
            }
            DetectionEvent::NothingToSend => write!(f, "NOTHING_TO_SEND"),
            DetectionEvent::ConnectivityChanged { status } => {
                write!(f, "CONNECTIVITY_CHANGED ({status:?})")
            }
        }
    }
}
