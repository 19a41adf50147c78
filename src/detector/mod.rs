//! Detection orchestration
//!
//! [`DetectionEngine`] holds every state transition of the live-detection
//! loop as synchronous code: it takes the current state plus one event and
//! returns the effects to carry out. [`Detector`] wraps it in the async
//! runtime — tickers, single-flight recognition dispatch, the hold-progress
//! ticker, and IPC commands.

mod engine;
mod orchestrator;

pub use engine::{DetectionEngine, Effect, HoldGuard, Reading};
pub use orchestrator::{Command, CommandError, Detector};
