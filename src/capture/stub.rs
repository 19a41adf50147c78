//! Stub frame source for development and tests
//!
//! Replays one fixed encoded frame on every capture, standing in for the
//! companion app's camera feed.

use std::path::Path;

use super::{CaptureError, Frame, FrameSource};

/// Frame source that returns the same encoded payload every cycle
#[derive(Debug, Clone)]
pub struct StaticFrameSource {
    image_base64: String,
}

impl StaticFrameSource {
    /// Create a source replaying the given base64 payload
    pub fn new(image_base64: impl Into<String>) -> Self {
        Self {
            image_base64: image_base64.into(),
        }
    }

    /// Load the payload from a file, trimming surrounding whitespace
    pub fn from_file(path: &Path) -> Result<Self, CaptureError> {
        let payload = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::Acquisition(format!("{}: {e}", path.display())))?;
        Ok(Self::new(payload.trim()))
    }
}

impl FrameSource for StaticFrameSource {
    fn capture(&self) -> Result<Frame, CaptureError> {
        if self.image_base64.is_empty() {
            return Err(CaptureError::NotReady);
        }
        Ok(Frame::new(self.image_base64.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_capture() {
        let source = StaticFrameSource::new("aGVsbG8=");
        let frame = source.capture().unwrap();
        assert_eq!(frame.image_base64, "aGVsbG8=");
    }

    #[test]
    fn test_empty_payload_is_not_ready() {
        let source = StaticFrameSource::new("");
        assert!(matches!(source.capture(), Err(CaptureError::NotReady)));
    }
}
