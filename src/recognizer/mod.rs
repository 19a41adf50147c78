//! Remote recognition service client
//!
//! One recognition call per admitted frame, with a per-request timeout and
//! bounded retry/backoff. "No hand in frame" is a normal outcome, not an
//! error, and is never retried.

mod backoff;
mod client;

pub use backoff::backoff_delay;
pub use client::{RecognitionClient, RecognizerError};

use std::time::Instant;

/// One per-cycle classification sample
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Recognized symbol label (a letter or a control token)
    pub symbol: String,
    /// Classifier confidence, 0.0 to 1.0
    pub confidence: f32,
    /// When the frame behind this sample was captured
    pub captured_at: Instant,
}

/// Result of one recognition cycle against the remote classifier
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The service recognized a symbol
    Detected(Observation),
    /// The service explicitly reported nothing recognizable in the frame
    NoSubject,
    /// Network, timeout, or server error, after exhausting retries
    Failed { reason: FailureReason },
}

/// Why a recognition cycle failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error: HTTP {0}")]
    Server(u16),

    #[error("request rejected: HTTP {0}")]
    Rejected(u16),
}

impl FailureReason {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Rejections other than the documented no-hand case are permanent and
    /// surface immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureReason::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_failures_are_retryable() {
        assert!(FailureReason::Timeout.is_retryable());
        assert!(FailureReason::Transport("connection refused".into()).is_retryable());
        assert!(FailureReason::Server(503).is_retryable());
    }

    #[test]
    fn test_rejections_are_permanent() {
        assert!(!FailureReason::Rejected(400).is_retryable());
        assert!(!FailureReason::Rejected(404).is_retryable());
    }
}
