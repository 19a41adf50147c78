//! Commit-gesture hold timing
//!
//! The commit symbol must stay the stable symbol for a second, longer
//! threshold before the buffer is dispatched. Progress ticks arrive from a
//! ticker task the orchestrator owns; each hold instance carries a
//! generation number so a tick queued before cancellation can never act on
//! a later hold.

use std::time::{Duration, Instant};

/// What a progress tick produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldTick {
    /// Hold still in progress, fraction of the threshold elapsed
    Progress(f32),
    /// The threshold was crossed; the hold is finished
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum HoldState {
    Inactive,
    Holding { started_at: Instant },
}

/// Times the long hold of the commit gesture
#[derive(Debug)]
pub struct HoldTimer {
    threshold: Duration,
    state: HoldState,
    generation: u64,
}

impl HoldTimer {
    /// Create a timer with the given hold threshold
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: HoldState::Inactive,
            generation: 0,
        }
    }

    /// Arm the hold at the commit symbol's first confirmation.
    ///
    /// Returns the new hold's generation, or `None` if a hold is already
    /// running (repeat confirmations of a held commit symbol are no-ops).
    pub fn start(&mut self, now: Instant) -> Option<u64> {
        if matches!(self.state, HoldState::Holding { .. }) {
            return None;
        }
        self.generation += 1;
        self.state = HoldState::Holding { started_at: now };
        Some(self.generation)
    }

    /// Apply one progress tick.
    ///
    /// Ticks whose generation does not match the live hold are stale and
    /// ignored. Completion deactivates the timer and invalidates the
    /// generation, so anything still queued behind it is dropped too.
    pub fn tick(&mut self, generation: u64, now: Instant) -> Option<HoldTick> {
        let started_at = match self.state {
            HoldState::Holding { started_at } if generation == self.generation => started_at,
            _ => return None,
        };

        let progress = self.fraction(started_at, now);
        if progress >= 1.0 {
            self.state = HoldState::Inactive;
            self.generation += 1;
            Some(HoldTick::Completed)
        } else {
            Some(HoldTick::Progress(progress))
        }
    }

    /// Abort the hold. Returns `true` if a hold was active.
    pub fn abort(&mut self) -> bool {
        if matches!(self.state, HoldState::Inactive) {
            return false;
        }
        self.state = HoldState::Inactive;
        self.generation += 1;
        true
    }

    /// Whether a hold is running
    pub fn is_active(&self) -> bool {
        matches!(self.state, HoldState::Holding { .. })
    }

    /// Current progress, 0.0 when inactive
    pub fn progress(&self, now: Instant) -> f32 {
        match self.state {
            HoldState::Holding { started_at } => self.fraction(started_at, now),
            HoldState::Inactive => 0.0,
        }
    }

    fn fraction(&self, started_at: Instant, now: Instant) -> f32 {
        let elapsed = now.duration_since(started_at).as_secs_f32();
        (elapsed / self.threshold.as_secs_f32()).min(1.0)
    }
}
