//! Async loop around the detection engine
//!
//! Owns the capture and health tickers, dispatches at most one recognition
//! call at a time, runs the hold-progress ticker, and applies the engine's
//! effects. Everything funnels through one `select!` loop so transitions
//! stay serialized with respect to tick handling.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::engine::{DetectionEngine, Effect};
use crate::capture::{CaptureThrottle, FrameSource};
use crate::config::DetectionTuning;
use crate::connectivity::ConnectivityMonitor;
use crate::events::DetectionEvent;
use crate::gesture::Vocabulary;
use crate::ipc::DetectorStatus;
use crate::recognizer::{Outcome, RecognitionClient};

/// Commands from the IPC surface
#[derive(Debug)]
pub enum Command {
    Start {
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    Stop {
        force: bool,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    ClearBuffer {
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    SendBuffer {
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    SetServerUrl {
        url: String,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
}

/// Why a command was refused
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("detection is already running")]
    AlreadyRunning,

    #[error("detection is not running")]
    NotRunning,

    #[error("a commit hold is in progress; pass force to stop anyway")]
    HoldInProgress { progress: f32 },
}

impl CommandError {
    /// Stable identifier for IPC error responses
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::AlreadyRunning => "already_running",
            CommandError::NotRunning => "not_running",
            CommandError::HoldInProgress { .. } => "hold_in_progress",
        }
    }
}

/// Internal messages resolving back into the loop
#[derive(Debug)]
enum LoopMsg {
    /// A recognition call settled
    Outcome { session: u64, outcome: Outcome },
    /// The hold-progress ticker fired
    HoldTick { generation: u64 },
    /// A health probe settled
    HealthResult { healthy: bool },
    /// The completion/speech pipeline finished
    PhraseFinished {
        original: String,
        completed: Option<String>,
    },
}

/// The running detection orchestrator
pub struct Detector {
    engine: DetectionEngine,
    throttle: CaptureThrottle,
    connectivity: ConnectivityMonitor,
    client: Arc<RecognitionClient>,
    source: Arc<dyn FrameSource>,
    tuning: DetectionTuning,
    event_tx: broadcast::Sender<DetectionEvent>,
    status: Arc<RwLock<DetectorStatus>>,
    loop_tx: mpsc::Sender<LoopMsg>,
    loop_rx: mpsc::Receiver<LoopMsg>,
    hold_ticker: Option<JoinHandle<()>>,
    /// Bumped on every start/stop; outcomes from an older session are stale
    session: u64,
    /// Server URL change waiting for the in-flight call to settle
    pending_base_url: Option<String>,
    health_inflight: bool,
}

impl Detector {
    pub fn new(
        tuning: &DetectionTuning,
        vocab: Vocabulary,
        client: Arc<RecognitionClient>,
        source: Arc<dyn FrameSource>,
        event_tx: broadcast::Sender<DetectionEvent>,
        status: Arc<RwLock<DetectorStatus>>,
    ) -> Self {
        let (loop_tx, loop_rx) = mpsc::channel(64);
        Self {
            engine: DetectionEngine::new(tuning, vocab),
            throttle: CaptureThrottle::new(tuning.capture_interval),
            connectivity: ConnectivityMonitor::new(),
            client,
            source,
            tuning: tuning.clone(),
            event_tx,
            status,
            loop_tx,
            loop_rx,
            hold_ticker: None,
            session: 0,
            pending_base_url: None,
            health_inflight: false,
        }
    }

    /// Run until the command channel closes
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        info!("detector loop started");

        let mut capture_tick = tokio::time::interval(self.tuning.capture_interval);
        capture_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut health_tick = tokio::time::interval(self.tuning.health_interval);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = capture_tick.tick() => {
                    self.on_capture_tick().await;
                }
                _ = health_tick.tick() => {
                    self.on_health_tick();
                }
                Some(msg) = self.loop_rx.recv() => {
                    self.on_loop_msg(msg).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.on_command(cmd).await,
                        None => break,
                    }
                }
            }
        }

        self.cancel_hold_ticker();
        info!("detector loop stopped");
    }

    async fn on_capture_tick(&mut self) {
        if !self.engine.is_running() {
            return;
        }

        let now = Instant::now();
        if !self.throttle.try_admit(now) {
            return;
        }

        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "frame capture failed, skipping cycle");
                self.throttle.release();
                return;
            }
        };

        if let Some(status) = self.connectivity.begin_request() {
            self.emit(DetectionEvent::ConnectivityChanged { status });
        }

        let client = Arc::clone(&self.client);
        let tx = self.loop_tx.clone();
        let session = self.session;
        tokio::spawn(async move {
            let outcome = client.recognize(frame).await;
            let _ = tx.send(LoopMsg::Outcome { session, outcome }).await;
        });
    }

    fn on_health_tick(&mut self) {
        if self.health_inflight {
            return;
        }
        let quiet = match self.connectivity.last_sample_at() {
            Some(at) => at.elapsed() >= self.tuning.health_interval,
            None => true,
        };
        if !quiet {
            return;
        }

        self.health_inflight = true;
        self.spawn_health_probe();
    }

    fn spawn_health_probe(&self) {
        let client = Arc::clone(&self.client);
        let tx = self.loop_tx.clone();
        tokio::spawn(async move {
            let healthy = client.health().await;
            let _ = tx.send(LoopMsg::HealthResult { healthy }).await;
        });
    }

    async fn on_loop_msg(&mut self, msg: LoopMsg) {
        match msg {
            LoopMsg::Outcome { session, outcome } => {
                if session != self.session {
                    debug!("discarding recognition outcome from a stopped session");
                    return;
                }
                self.throttle.release();

                let now = Instant::now();
                if let Some(status) = self.connectivity.report(&outcome, now) {
                    self.emit(DetectionEvent::ConnectivityChanged { status });
                }
                if let Outcome::Failed { reason } = &outcome {
                    warn!(%reason, "recognition cycle failed");
                }

                let effects = self.engine.on_outcome(outcome, now);
                self.apply_effects(effects).await;
                self.apply_pending_base_url();
            }
            LoopMsg::HoldTick { generation } => {
                let effects = self.engine.on_hold_tick(generation, Instant::now());
                self.apply_effects(effects).await;
            }
            LoopMsg::HealthResult { healthy } => {
                self.health_inflight = false;
                if let Some(status) = self.connectivity.report_health(healthy, Instant::now()) {
                    self.emit(DetectionEvent::ConnectivityChanged { status });
                }
                self.refresh_status().await;
            }
            LoopMsg::PhraseFinished {
                original,
                completed,
            } => {
                self.emit(DetectionEvent::PhraseFinished {
                    original,
                    completed,
                });
            }
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let result = if self.engine.is_running() {
                    Err(CommandError::AlreadyRunning)
                } else {
                    self.session += 1;
                    self.throttle.reset();
                    let effects = self.engine.start(Instant::now());
                    self.apply_effects(effects).await;
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::Stop { force, reply } => {
                let result = if !self.engine.is_running() {
                    Err(CommandError::NotRunning)
                } else {
                    match self.engine.stop(force, Instant::now()) {
                        Ok(effects) => {
                            self.session += 1;
                            self.throttle.reset();
                            self.apply_effects(effects).await;
                            self.apply_pending_base_url();
                            Ok(())
                        }
                        Err(guard) => Err(CommandError::HoldInProgress {
                            progress: guard.progress,
                        }),
                    }
                };
                let _ = reply.send(result);
            }
            Command::ClearBuffer { reply } => {
                let effects = self.engine.manual_clear();
                self.apply_effects(effects).await;
                let _ = reply.send(Ok(()));
            }
            Command::SendBuffer { reply } => {
                let effects = self.engine.manual_send();
                self.apply_effects(effects).await;
                let _ = reply.send(Ok(()));
            }
            Command::SetServerUrl { url, reply } => {
                if self.throttle.is_busy() {
                    // Never swap the URL under an in-flight call.
                    debug!(%url, "deferring server URL change until the cycle settles");
                    self.pending_base_url = Some(url);
                } else {
                    self.apply_base_url(url);
                }
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn apply_pending_base_url(&mut self) {
        if let Some(url) = self.pending_base_url.take() {
            self.apply_base_url(url);
        }
    }

    fn apply_base_url(&mut self, url: String) {
        info!(%url, "switching recognition server");
        self.client.set_base_url(&url);
        if let Some(status) = self.connectivity.reset() {
            self.emit(DetectionEvent::ConnectivityChanged { status });
        }
        if !self.health_inflight {
            self.health_inflight = true;
            self.spawn_health_probe();
        }
    }

    async fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.emit(event),
                Effect::StartHoldTicker { generation } => self.start_hold_ticker(generation),
                Effect::CancelHoldTicker => self.cancel_hold_ticker(),
                Effect::DispatchPhrase { text } => self.dispatch_phrase(text),
            }
        }
        self.refresh_status().await;
    }

    fn start_hold_ticker(&mut self, generation: u64) {
        self.cancel_hold_ticker();

        let tx = self.loop_tx.clone();
        let period = self.tuning.hold_progress_interval;
        self.hold_ticker = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            // The interval's first tick completes immediately; progress
            // starts one period in.
            tick.tick().await;
            loop {
                tick.tick().await;
                if tx.send(LoopMsg::HoldTick { generation }).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_hold_ticker(&mut self) {
        if let Some(ticker) = self.hold_ticker.take() {
            ticker.abort();
        }
    }

    fn dispatch_phrase(&self, text: String) {
        let client = Arc::clone(&self.client);
        let tx = self.loop_tx.clone();
        tokio::spawn(async move {
            let completed = match client.complete_text(&text).await {
                Ok(completed) => Some(completed),
                Err(e) => {
                    warn!(error = %e, "text completion failed, speaking original");
                    None
                }
            };

            let spoken = completed.as_deref().unwrap_or(&text);
            if let Err(e) = client.speak(spoken).await {
                warn!(error = %e, "speech request failed");
            }

            let _ = tx
                .send(LoopMsg::PhraseFinished {
                    original: text,
                    completed,
                })
                .await;
        });
    }

    fn emit(&self, event: DetectionEvent) {
        debug!(%event, "event");
        let _ = self.event_tx.send(event);
    }

    async fn refresh_status(&self) {
        let mut status = self.status.write().await;
        status.running = self.engine.is_running();
        status.reading = self.engine.reading().clone();
        status.buffer = self.engine.buffer_text().to_string();
        status.connectivity = self.connectivity.status();
        status.frames_processed = self.engine.frames_processed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StaticFrameSource;
    use std::time::Duration;

    fn detector() -> (Detector, mpsc::Sender<Command>, mpsc::Receiver<Command>) {
        let tuning = DetectionTuning::default();
        let client = Arc::new(
            RecognitionClient::new("http://127.0.0.1:5000", Duration::from_secs(1), 1).unwrap(),
        );
        let source: Arc<dyn FrameSource> = Arc::new(StaticFrameSource::new("aGVsbG8="));
        let (event_tx, _) = broadcast::channel(16);
        let status = Arc::new(RwLock::new(DetectorStatus::default()));
        let detector = Detector::new(
            &tuning,
            Vocabulary::default(),
            client,
            source,
            event_tx,
            status,
        );
        let (tx, rx) = mpsc::channel(8);
        (detector, tx, rx)
    }

    #[test]
    fn test_command_error_codes() {
        assert_eq!(CommandError::AlreadyRunning.code(), "already_running");
        assert_eq!(CommandError::NotRunning.code(), "not_running");
        assert_eq!(
            CommandError::HoldInProgress { progress: 0.5 }.code(),
            "hold_in_progress"
        );
    }

    #[tokio::test]
    async fn test_start_and_double_start() {
        let (mut detector, _tx, _rx) = detector();

        let (reply_tx, reply_rx) = oneshot::channel();
        detector.on_command(Command::Start { reply: reply_tx }).await;
        assert_eq!(reply_rx.await.unwrap(), Ok(()));
        assert!(detector.engine.is_running());

        let (reply_tx, reply_rx) = oneshot::channel();
        detector.on_command(Command::Start { reply: reply_tx }).await;
        assert_eq!(reply_rx.await.unwrap(), Err(CommandError::AlreadyRunning));
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_refused() {
        let (mut detector, _tx, _rx) = detector();

        let (reply_tx, reply_rx) = oneshot::channel();
        detector
            .on_command(Command::Stop {
                force: false,
                reply: reply_tx,
            })
            .await;
        assert_eq!(reply_rx.await.unwrap(), Err(CommandError::NotRunning));
    }

    #[tokio::test]
    async fn test_stale_outcome_is_discarded() {
        let (mut detector, _tx, _rx) = detector();

        let (reply_tx, _reply_rx) = oneshot::channel();
        detector.on_command(Command::Start { reply: reply_tx }).await;

        // An outcome from a previous session must not advance the engine.
        detector
            .on_loop_msg(LoopMsg::Outcome {
                session: 0,
                outcome: Outcome::NoSubject,
            })
            .await;
        assert_eq!(detector.engine.frames_processed(), 0);

        detector
            .on_loop_msg(LoopMsg::Outcome {
                session: detector.session,
                outcome: Outcome::NoSubject,
            })
            .await;
        assert_eq!(detector.engine.frames_processed(), 1);
    }

    #[tokio::test]
    async fn test_deferred_url_change_applies_on_settle() {
        let (mut detector, _tx, _rx) = detector();

        let (reply_tx, _reply_rx) = oneshot::channel();
        detector.on_command(Command::Start { reply: reply_tx }).await;

        detector.throttle.try_admit(Instant::now());
        let (reply_tx, reply_rx) = oneshot::channel();
        detector
            .on_command(Command::SetServerUrl {
                url: "http://10.0.0.9:5000".to_string(),
                reply: reply_tx,
            })
            .await;
        assert_eq!(reply_rx.await.unwrap(), Ok(()));
        assert_eq!(detector.client.base_url(), "http://127.0.0.1:5000");

        detector
            .on_loop_msg(LoopMsg::Outcome {
                session: detector.session,
                outcome: Outcome::NoSubject,
            })
            .await;
        assert_eq!(detector.client.base_url(), "http://10.0.0.9:5000");
    }
}
