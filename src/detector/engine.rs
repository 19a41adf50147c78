//! Synchronous transition core for the detection loop
//!
//! Every state change lives here, in plain methods that take the full
//! current state and one event, apply the transition, and return a list of
//! effects for the orchestrator to execute. No timers, channels, or I/O:
//! the engine can be driven tick by tick in tests with explicit instants.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::DetectionTuning;
use crate::events::DetectionEvent;
use crate::gesture::{GestureAccumulator, HoldTick, HoldTimer, StabilityTracker, Vocabulary};
use crate::recognizer::Outcome;

/// Side effect requested by a transition, executed by the orchestrator
/// after the state change has been applied
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Broadcast an event to observers
    Emit(DetectionEvent),
    /// Spawn the 50 ms hold-progress ticker for the given hold instance
    StartHoldTicker { generation: u64 },
    /// Abort the running hold-progress ticker
    CancelHoldTicker,
    /// Run the completion/speech pipeline for a finished phrase
    DispatchPhrase { text: String },
}

/// What the UI should display for the most recent cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    /// No cycle has settled since detection started
    Idle,
    /// A symbol was recognized with acceptable confidence
    Symbol { symbol: String, confidence: f32 },
    /// The service saw no hand in the frame
    NoSubject,
    /// The last cycle failed after exhausting retries
    ConnectionError,
}

/// Stop was refused because a commit hold is past the guard threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldGuard {
    pub progress: f32,
}

/// Fraction of hold progress beyond which a non-forced stop is refused
const STOP_GUARD_PROGRESS: f32 = 0.1;

/// The detection loop's state machine
#[derive(Debug)]
pub struct DetectionEngine {
    min_confidence: f32,
    vocab: Vocabulary,
    stability: StabilityTracker,
    hold: HoldTimer,
    accumulator: GestureAccumulator,
    running: bool,
    reading: Reading,
    frames: u64,
}

impl DetectionEngine {
    pub fn new(tuning: &DetectionTuning, vocab: Vocabulary) -> Self {
        Self {
            min_confidence: tuning.min_confidence,
            stability: StabilityTracker::new(tuning.dwell_threshold),
            hold: HoldTimer::new(tuning.hold_threshold),
            accumulator: GestureAccumulator::new(vocab.clone()),
            vocab,
            running: false,
            reading: Reading::Idle,
            frames: 0,
        }
    }

    /// Begin a detection run. Transient state resets; the buffer survives.
    pub fn start(&mut self, _now: Instant) -> Vec<Effect> {
        self.running = true;
        self.frames = 0;
        self.reading = Reading::Idle;
        self.stability.reset();

        let mut effects = Vec::new();
        if self.hold.abort() {
            effects.push(Effect::CancelHoldTicker);
        }
        effects.push(Effect::Emit(DetectionEvent::DetectionStarted));
        effects
    }

    /// End the detection run, aborting any pending hold without completing
    /// it. Refused when a hold is significantly progressed unless `force`
    /// is set.
    pub fn stop(&mut self, force: bool, now: Instant) -> Result<Vec<Effect>, HoldGuard> {
        let progress = self.hold.progress(now);
        if !force && progress > STOP_GUARD_PROGRESS {
            return Err(HoldGuard { progress });
        }

        self.running = false;
        self.reading = Reading::Idle;
        self.stability.reset();

        let mut effects = Vec::new();
        self.abort_hold(&mut effects);
        effects.push(Effect::Emit(DetectionEvent::DetectionStopped {
            frames_processed: self.frames,
        }));
        Ok(effects)
    }

    /// Apply one settled recognition cycle
    pub fn on_outcome(&mut self, outcome: Outcome, now: Instant) -> Vec<Effect> {
        if !self.running {
            return Vec::new();
        }
        self.frames += 1;

        let mut effects = Vec::new();
        match outcome {
            Outcome::Detected(obs) if obs.confidence >= self.min_confidence => {
                self.reading = Reading::Symbol {
                    symbol: obs.symbol.clone(),
                    confidence: obs.confidence,
                };

                // A hold only survives while the commit symbol is the one
                // on screen.
                if self.hold.is_active() && !self.vocab.is_commit(&obs.symbol) {
                    self.abort_hold(&mut effects);
                }

                if let Some(symbol) = self.stability.observe(&obs, now) {
                    effects.push(Effect::Emit(DetectionEvent::SymbolConfirmed {
                        symbol: symbol.clone(),
                    }));

                    if self.vocab.is_commit(&symbol) {
                        if let Some(generation) = self.hold.start(now) {
                            effects.push(Effect::StartHoldTicker { generation });
                        }
                    } else if self.accumulator.on_confirmed(&symbol) {
                        effects.push(Effect::Emit(DetectionEvent::BufferUpdated {
                            text: self.accumulator.text().to_string(),
                        }));
                    }
                }
            }
            // Low-confidence detections read the same as an empty frame.
            Outcome::Detected(_) | Outcome::NoSubject => {
                self.reading = Reading::NoSubject;
                self.stability.reset();
                self.abort_hold(&mut effects);
            }
            Outcome::Failed { .. } => {
                // No information: the stability run and any hold stand.
                self.reading = Reading::ConnectionError;
            }
        }
        effects
    }

    /// Apply one hold-progress tick
    pub fn on_hold_tick(&mut self, generation: u64, now: Instant) -> Vec<Effect> {
        if !self.running {
            return Vec::new();
        }

        match self.hold.tick(generation, now) {
            None => Vec::new(),
            Some(HoldTick::Progress(progress)) => {
                vec![Effect::Emit(DetectionEvent::CommitProgress { progress })]
            }
            Some(HoldTick::Completed) => {
                let mut effects = vec![Effect::CancelHoldTicker];
                self.stability.reset();
                self.finish_commit(&mut effects);
                effects
            }
        }
    }

    /// Dispatch the buffer immediately, as if the commit hold completed
    pub fn manual_send(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.abort_hold(&mut effects);
        self.stability.reset();
        self.finish_commit(&mut effects);
        effects
    }

    /// Clear the buffer and abort any in-progress hold. Idempotent.
    pub fn manual_clear(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.abort_hold(&mut effects);
        self.stability.reset();
        self.accumulator.clear();
        self.reading = Reading::Idle;
        effects.push(Effect::Emit(DetectionEvent::BufferCleared));
        effects
    }

    fn finish_commit(&mut self, effects: &mut Vec<Effect>) {
        match self.accumulator.take_phrase() {
            Some(phrase) => {
                effects.push(Effect::Emit(DetectionEvent::CommitCompleted {
                    phrase: phrase.clone(),
                }));
                effects.push(Effect::Emit(DetectionEvent::BufferUpdated {
                    text: String::new(),
                }));
                effects.push(Effect::DispatchPhrase { text: phrase });
            }
            None => effects.push(Effect::Emit(DetectionEvent::NothingToSend)),
        }
    }

    fn abort_hold(&mut self, effects: &mut Vec<Effect>) {
        if self.hold.abort() {
            effects.push(Effect::CancelHoldTicker);
            effects.push(Effect::Emit(DetectionEvent::CommitProgress {
                progress: 0.0,
            }));
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    pub fn buffer_text(&self) -> &str {
        self.accumulator.text()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn hold_progress(&self, now: Instant) -> f32 {
        self.hold.progress(now)
    }
}
