//! Debouncing of noisy per-frame predictions into confirmed symbols
//!
//! A symbol is confirmed once it has been observed continuously for the
//! dwell threshold. Confirmation restarts the dwell clock for that same
//! symbol, so a gesture held in place can confirm again (which is how the
//! commit hold keeps verifying that the hand has not moved). Any change of
//! symbol, and any cycle without a subject, resets the run unconditionally.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::recognizer::Observation;

/// Tracks how long the same symbol has been observed
#[derive(Debug)]
pub struct StabilityTracker {
    dwell: Duration,
    run: RunState,
}

#[derive(Debug, Clone, PartialEq)]
enum RunState {
    /// No symbol is currently being tracked
    Unstable,
    /// The same symbol keeps reappearing, dwell not yet met
    Accumulating { symbol: String, since: Instant },
}

impl StabilityTracker {
    /// Create a tracker with the given dwell threshold
    pub fn new(dwell: Duration) -> Self {
        Self {
            dwell,
            run: RunState::Unstable,
        }
    }

    /// Feed one cycle's accepted observation.
    ///
    /// Returns the confirmed symbol when this observation crosses the dwell
    /// threshold; at most one confirmation per dwell window.
    pub fn observe(&mut self, observation: &Observation, now: Instant) -> Option<String> {
        match &self.run {
            RunState::Accumulating { symbol, since } if *symbol == observation.symbol => {
                if now.duration_since(*since) >= self.dwell {
                    let confirmed = symbol.clone();
                    debug!(symbol = %confirmed, "symbol confirmed");
                    // Restart the dwell clock so a held gesture keeps
                    // producing a live run.
                    self.run = RunState::Accumulating {
                        symbol: confirmed.clone(),
                        since: now,
                    };
                    Some(confirmed)
                } else {
                    None
                }
            }
            _ => {
                self.run = RunState::Accumulating {
                    symbol: observation.symbol.clone(),
                    since: now,
                };
                None
            }
        }
    }

    /// Drop any in-progress run (no subject, or transient state reset)
    pub fn reset(&mut self) {
        self.run = RunState::Unstable;
    }

    /// Symbol of the current run, if one is being tracked
    pub fn tracking_symbol(&self) -> Option<&str> {
        match &self.run {
            RunState::Accumulating { symbol, .. } => Some(symbol),
            RunState::Unstable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DWELL: Duration = Duration::from_millis(400);

    fn obs(symbol: &str) -> Observation {
        Observation {
            symbol: symbol.to_string(),
            confidence: 0.9,
            captured_at: Instant::now(),
        }
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_confirms_once_at_dwell() {
        let mut tracker = StabilityTracker::new(DWELL);
        let base = Instant::now();

        assert_eq!(tracker.observe(&obs("H"), at(base, 0)), None);
        assert_eq!(tracker.observe(&obs("H"), at(base, 200)), None);
        assert_eq!(
            tracker.observe(&obs("H"), at(base, 400)),
            Some("H".to_string())
        );
        // Dwell restarted at 400 ms; the next tick is not a new confirmation.
        assert_eq!(tracker.observe(&obs("H"), at(base, 600)), None);
    }

    #[test]
    fn test_held_symbol_confirms_each_dwell_window() {
        let mut tracker = StabilityTracker::new(DWELL);
        let base = Instant::now();

        tracker.observe(&obs("SEND"), at(base, 0));
        assert!(tracker.observe(&obs("SEND"), at(base, 400)).is_some());
        assert!(tracker.observe(&obs("SEND"), at(base, 600)).is_none());
        assert!(tracker.observe(&obs("SEND"), at(base, 800)).is_some());
    }

    #[test]
    fn test_symbol_change_restarts_dwell() {
        let mut tracker = StabilityTracker::new(DWELL);
        let base = Instant::now();

        tracker.observe(&obs("A"), at(base, 0));
        tracker.observe(&obs("B"), at(base, 200));
        // 400 ms after the first A, but only 200 ms into the B run.
        assert_eq!(tracker.observe(&obs("B"), at(base, 400)), None);
        assert_eq!(
            tracker.observe(&obs("B"), at(base, 600)),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_reset_does_not_carry_dwell_across_gap() {
        let mut tracker = StabilityTracker::new(DWELL);
        let base = Instant::now();

        tracker.observe(&obs("A"), at(base, 0));
        tracker.reset();
        // The run restarts at 400 ms; the earlier dwell never counts.
        assert_eq!(tracker.observe(&obs("A"), at(base, 400)), None);
        assert_eq!(tracker.observe(&obs("A"), at(base, 600)), None);
        assert_eq!(
            tracker.observe(&obs("A"), at(base, 800)),
            Some("A".to_string())
        );
    }

    #[test]
    fn test_tracking_symbol() {
        let mut tracker = StabilityTracker::new(DWELL);
        assert_eq!(tracker.tracking_symbol(), None);
        tracker.observe(&obs("K"), Instant::now());
        assert_eq!(tracker.tracking_symbol(), Some("K"));
        tracker.reset();
        assert_eq!(tracker.tracking_symbol(), None);
    }
}
