//! Frame acquisition seam and capture admission control
//!
//! Camera hardware and image encoding live in the companion app; the daemon
//! only sees already-encoded frames through the [`FrameSource`] trait. The
//! [`CaptureThrottle`] decides when a new capture/recognition cycle may
//! start, keeping at most one request in flight.

mod stub;
mod throttle;

pub use stub::StaticFrameSource;
pub use throttle::CaptureThrottle;

use std::time::Instant;

/// A single captured camera frame, already encoded for the wire
#[derive(Debug, Clone)]
pub struct Frame {
    /// Base64-encoded JPEG payload
    pub image_base64: String,
    /// When the frame was captured
    pub captured_at: Instant,
}

impl Frame {
    /// Create a frame captured now
    pub fn new(image_base64: impl Into<String>) -> Self {
        Self {
            image_base64: image_base64.into(),
            captured_at: Instant::now(),
        }
    }
}

/// Errors that can occur while acquiring a frame
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("frame source is not ready")]
    NotReady,

    #[error("frame acquisition failed: {0}")]
    Acquisition(String),
}

/// Source of encoded camera frames.
///
/// Capture must be fast and non-blocking; the recognition network call is
/// the only operation in the pipeline allowed to suspend.
pub trait FrameSource: Send + Sync {
    /// Produce the current frame
    fn capture(&self) -> Result<Frame, CaptureError>;
}
