//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Fallback URL for the recognition backend (local Flask server).
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Base URL of the remote recognition service
    pub backend_url: String,

    /// Optional file holding a base64-encoded frame for the stub source
    pub frame_file: Option<PathBuf>,

    /// Timing and threshold knobs for the detection loop
    pub tuning: DetectionTuning,
}

/// Timing and threshold parameters for the detection pipeline.
///
/// Defaults mirror the live/low-latency detection path: a 200 ms capture
/// cadence, a 400 ms dwell before a symbol is confirmed, and a 900 ms hold
/// for the commit gesture.
#[derive(Debug, Clone)]
pub struct DetectionTuning {
    /// Minimum interval between admitted capture cycles
    pub capture_interval: Duration,
    /// Continuous time a symbol must be observed before confirmation
    pub dwell_threshold: Duration,
    /// Continuous hold past confirmation that completes a commit
    pub hold_threshold: Duration,
    /// Cadence of commit-hold progress reports
    pub hold_progress_interval: Duration,
    /// Minimum confidence for an observation to count
    pub min_confidence: f32,
    /// Per-request timeout for recognition calls
    pub request_timeout: Duration,
    /// Total attempts for a failing recognition call
    pub max_attempts: u32,
    /// Interval between health probes when detection is quiet
    pub health_interval: Duration,
}

impl Default for DetectionTuning {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(200),
            dwell_threshold: Duration::from_millis(400),
            hold_threshold: Duration::from_millis(900),
            hold_progress_interval: Duration::from_millis(50),
            min_confidence: 0.25,
            request_timeout: Duration::from_secs(15),
            max_attempts: 3,
            health_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("signbridge");

        let socket_path = data_dir.join("daemon.sock");

        let backend_url = std::env::var("SIGNBRIDGE_BACKEND_URL")
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());

        let frame_file = std::env::var("SIGNBRIDGE_FRAME_FILE")
            .ok()
            .map(PathBuf::from);

        Ok(Self {
            socket_path,
            data_dir,
            backend_url,
            frame_file,
            tuning: DetectionTuning::default(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.socket_path.to_string_lossy().contains("signbridge"));
        assert!(!config.backend_url.is_empty());
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = DetectionTuning::default();
        assert_eq!(tuning.capture_interval, Duration::from_millis(200));
        assert_eq!(tuning.dwell_threshold, Duration::from_millis(400));
        assert_eq!(tuning.hold_threshold, Duration::from_millis(900));
        assert_eq!(tuning.max_attempts, 3);
    }
}
