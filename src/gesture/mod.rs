//! Interpretation of stabilized symbols into text and commands
//!
//! Raw per-frame predictions are debounced by the [`StabilityTracker`],
//! confirmed symbols flow into the [`GestureAccumulator`], and the commit
//! gesture's long hold is timed by the [`HoldTimer`].

mod accumulator;
mod hold;
mod stability;
mod vocab;

pub use accumulator::GestureAccumulator;
pub use hold::{HoldTick, HoldTimer};
pub use stability::StabilityTracker;
pub use vocab::Vocabulary;
