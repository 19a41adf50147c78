//! HTTP client for the recognition service
//!
//! JSON over HTTP against a runtime-configurable base URL. The detect call
//! retries transient failures with exponential backoff; health, completion,
//! speech, and label fetches are single-shot.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{backoff_delay, FailureReason, Observation, Outcome};
use crate::capture::Frame;

/// Error body the service sends with a 400 when no hand is in the frame
const NO_HAND_ERROR: &str = "No hand detected";

/// Errors from the non-detect endpoints
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server reported failure: {0}")]
    Failure(String),
}

/// Client for the remote recognition service
pub struct RecognitionClient {
    http: reqwest::Client,
    base_url: RwLock<String>,
    max_attempts: u32,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    success: bool,
    #[serde(default)]
    prediction: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    model_loaded: bool,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    success: bool,
    #[serde(default)]
    original_text: String,
    completed_text: String,
}

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    labels: BTreeMap<String, String>,
}

impl RecognitionClient {
    /// Create a client against the given base URL
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, RecognizerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url: RwLock::new(base_url),
            max_attempts: max_attempts.max(1),
        })
    }

    /// Point the client at a different server.
    ///
    /// The caller must make sure no recognition call is in flight; the
    /// orchestrator defers the switch until the current cycle settles.
    pub fn set_base_url(&self, url: &str) {
        let mut base = self.lock_base_url_mut();
        *base = url.trim_end_matches('/').to_string();
    }

    /// Current base URL
    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_base_url_mut(&self) -> std::sync::RwLockWriteGuard<'_, String> {
        self.base_url.write().unwrap_or_else(|e| e.into_inner())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Run one recognition cycle for the frame.
    ///
    /// `NoSubject` and successful detections return immediately; transient
    /// failures are retried with exponential backoff until the attempt
    /// budget is spent. Never panics and never surfaces an error type: the
    /// caller always receives a typed [`Outcome`].
    pub async fn recognize(&self, frame: Frame) -> Outcome {
        let mut attempt = 1;

        loop {
            match self.attempt_detect(&frame).await {
                Ok(outcome) => return outcome,
                Err(reason) => {
                    if !reason.is_retryable() || attempt >= self.max_attempts {
                        return Outcome::Failed { reason };
                    }

                    let delay = backoff_delay(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "detect attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_detect(&self, frame: &Frame) -> Result<Outcome, FailureReason> {
        let body = DetectRequest {
            image: &frame.image_base64,
        };

        let response = self
            .http
            .post(self.url("/detect"))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::BAD_REQUEST {
                // The documented no-hand rejection is a normal outcome.
                if let Ok(err) = response.json::<ErrorBody>().await {
                    if err.error.as_deref() == Some(NO_HAND_ERROR) {
                        return Ok(Outcome::NoSubject);
                    }
                }
                return Err(FailureReason::Rejected(status.as_u16()));
            }
            if status.is_server_error() {
                return Err(FailureReason::Server(status.as_u16()));
            }
            return Err(FailureReason::Rejected(status.as_u16()));
        }

        let body: DetectResponse = response.json().await.map_err(classify_transport)?;
        if !body.success || body.prediction.is_empty() {
            return Ok(Outcome::NoSubject);
        }

        Ok(Outcome::Detected(Observation {
            symbol: body.prediction,
            confidence: body.confidence,
            captured_at: frame.captured_at,
        }))
    }

    /// Probe `/health`. Not retried; a failed probe just reads as down.
    pub async fn health(&self) -> bool {
        let response = match self.http.get(self.url("/health")).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "health probe failed");
                return false;
            }
        };

        if !response.status().is_success() {
            return false;
        }

        match response.json::<HealthResponse>().await {
            Ok(health) => health.status == "healthy" && health.model_loaded,
            Err(e) => {
                warn!(error = %e, "malformed health response");
                false
            }
        }
    }

    /// Complete an accumulated phrase via the server's language model
    pub async fn complete_text(&self, text: &str) -> Result<String, RecognizerError> {
        let response = self
            .http
            .post(self.url("/complete_text"))
            .json(&TextRequest { text: text.trim() })
            .send()
            .await?
            .error_for_status()?;

        let completion: CompletionResponse = response.json().await?;
        if !completion.success {
            return Err(RecognizerError::Failure(format!(
                "completion rejected for {:?}",
                completion.original_text
            )));
        }

        Ok(completion.completed_text)
    }

    /// Speak a phrase through the server-side TTS. Fire-and-forget for the
    /// caller; failures are non-fatal.
    pub async fn speak(&self, text: &str) -> Result<(), RecognizerError> {
        self.http
            .post(self.url("/speak"))
            .json(&TextRequest { text: text.trim() })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Fetch the symbol vocabulary the server recognizes
    pub async fn labels(&self) -> Result<Vec<String>, RecognizerError> {
        let response = self
            .http
            .get(self.url("/labels"))
            .send()
            .await?
            .error_for_status()?;

        let body: LabelsResponse = response.json().await?;
        Ok(body.labels.into_values().collect())
    }
}

fn classify_transport(e: reqwest::Error) -> FailureReason {
    if e.is_timeout() {
        FailureReason::Timeout
    } else {
        FailureReason::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_response_parsing() {
        let json = r#"{
            "success": true,
            "prediction": "A",
            "confidence": 0.93,
            "bounding_box": {"x1": 0, "y1": 0, "x2": 10, "y2": 10},
            "landmarks": []
        }"#;
        let parsed: DetectResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.prediction, "A");
        assert!((parsed.confidence - 0.93).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unsuccessful_detect_response_parsing() {
        let json = r#"{"success": false, "prediction": "", "confidence": 0, "message": "No hand found"}"#;
        let parsed: DetectResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert!(parsed.prediction.is_empty());
    }

    #[test]
    fn test_labels_response_parsing() {
        let json = r#"{"labels": {"0": "A", "1": "B", "26": "SPACE", "27": "SEND"}, "total_classes": 28}"#;
        let parsed: LabelsResponse = serde_json::from_str(json).unwrap();
        let values: Vec<_> = parsed.labels.into_values().collect();
        assert!(values.contains(&"SPACE".to_string()));
        assert!(values.contains(&"SEND".to_string()));
    }

    #[test]
    fn test_health_response_parsing() {
        let json = r#"{"status": "healthy", "model_loaded": true, "detector_loaded": true, "openai_available": false}"#;
        let parsed: HealthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, "healthy");
        assert!(parsed.model_loaded);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client =
            RecognitionClient::new("http://localhost:5000/", Duration::from_secs(15), 3).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");

        client.set_base_url("http://10.0.0.2:5000/");
        assert_eq!(client.base_url(), "http://10.0.0.2:5000");
    }
}
