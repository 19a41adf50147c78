//! Admission control for capture/recognition cycles

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Gate deciding whether a new capture/recognition cycle may start.
///
/// A cycle is admitted only when no request is in flight and the minimum
/// inter-capture interval has elapsed since the last admission. On
/// admission the throttle marks itself busy; [`CaptureThrottle::release`]
/// must be called exactly once when the cycle's network call settles,
/// whatever the outcome.
#[derive(Debug)]
pub struct CaptureThrottle {
    min_interval: Duration,
    inner: Mutex<ThrottleInner>,
}

#[derive(Debug, Default)]
struct ThrottleInner {
    busy: bool,
    last_admitted: Option<Instant>,
}

impl CaptureThrottle {
    /// Create a throttle with the given minimum inter-capture interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            inner: Mutex::new(ThrottleInner::default()),
        }
    }

    /// Try to admit a new cycle at `now`.
    ///
    /// Returns `true` and marks the throttle busy on admission. Calls are
    /// serialized by the internal lock, so concurrent callers can never
    /// both be admitted for the same slot.
    pub fn try_admit(&self, now: Instant) -> bool {
        let mut inner = self.lock();

        if inner.busy {
            return false;
        }

        if let Some(last) = inner.last_admitted {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }

        inner.busy = true;
        inner.last_admitted = Some(now);
        true
    }

    /// Settle the in-flight cycle, allowing the next admission
    pub fn release(&self) {
        self.lock().busy = false;
    }

    /// Whether a cycle is currently in flight
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Forget the busy flag and the last admission time
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.busy = false;
        inner.last_admitted = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleInner> {
        // A poisoned lock only means a panic elsewhere; the flag itself
        // is still coherent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
