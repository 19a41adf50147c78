//! Network reachability state derived from recent call outcomes
//!
//! Connectivity is not authoritative: it is recomputed from whatever the
//! most recent recognition cycle or health probe reported. Only the monitor
//! writes the status; everyone else reads snapshots.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::recognizer::Outcome;

/// Reachability of the recognition service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    /// The last sample reached the server
    Online,
    /// The last sample failed
    Offline,
    /// A call is in flight and no sample has settled yet
    Connecting,
}

/// Tracks connectivity from recognition outcomes and health probes
#[derive(Debug)]
pub struct ConnectivityMonitor {
    status: ConnectivityStatus,
    last_sample: Option<Instant>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self {
            status: ConnectivityStatus::Connecting,
            last_sample: None,
        }
    }

    /// Current status
    pub fn status(&self) -> ConnectivityStatus {
        self.status
    }

    /// When the last sample settled, if any
    pub fn last_sample_at(&self) -> Option<Instant> {
        self.last_sample
    }

    /// Note that a call just went out. Shows `Connecting` only before the
    /// first sample; afterwards the last settled status stands until the
    /// call resolves.
    pub fn begin_request(&mut self) -> Option<ConnectivityStatus> {
        if self.last_sample.is_none() {
            self.transition(ConnectivityStatus::Connecting)
        } else {
            None
        }
    }

    /// Apply a recognition outcome. A detected symbol or an explicit
    /// no-subject both mean the server answered; only failures read as
    /// offline. Returns the new status if it changed.
    pub fn report(&mut self, outcome: &Outcome, now: Instant) -> Option<ConnectivityStatus> {
        self.last_sample = Some(now);
        let status = match outcome {
            Outcome::Detected(_) | Outcome::NoSubject => ConnectivityStatus::Online,
            Outcome::Failed { .. } => ConnectivityStatus::Offline,
        };
        self.transition(status)
    }

    /// Apply a health probe result
    pub fn report_health(&mut self, healthy: bool, now: Instant) -> Option<ConnectivityStatus> {
        self.last_sample = Some(now);
        let status = if healthy {
            ConnectivityStatus::Online
        } else {
            ConnectivityStatus::Offline
        };
        self.transition(status)
    }

    /// Forget cached state, e.g. after the server URL changed
    pub fn reset(&mut self) -> Option<ConnectivityStatus> {
        self.last_sample = None;
        self.transition(ConnectivityStatus::Connecting)
    }

    fn transition(&mut self, status: ConnectivityStatus) -> Option<ConnectivityStatus> {
        if self.status == status {
            return None;
        }
        self.status = status;
        Some(status)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::FailureReason;

    #[test]
    fn test_starts_connecting() {
        let monitor = ConnectivityMonitor::new();
        assert_eq!(monitor.status(), ConnectivityStatus::Connecting);
    }

    #[test]
    fn test_no_subject_is_online() {
        let mut monitor = ConnectivityMonitor::new();
        let change = monitor.report(&Outcome::NoSubject, Instant::now());
        assert_eq!(change, Some(ConnectivityStatus::Online));
        assert_eq!(monitor.status(), ConnectivityStatus::Online);
    }

    #[test]
    fn test_failure_is_offline() {
        let mut monitor = ConnectivityMonitor::new();
        let outcome = Outcome::Failed {
            reason: FailureReason::Timeout,
        };
        assert_eq!(
            monitor.report(&outcome, Instant::now()),
            Some(ConnectivityStatus::Offline)
        );
    }

    #[test]
    fn test_unchanged_status_reports_nothing() {
        let mut monitor = ConnectivityMonitor::new();
        let now = Instant::now();
        assert!(monitor.report(&Outcome::NoSubject, now).is_some());
        assert!(monitor.report(&Outcome::NoSubject, now).is_none());
    }

    #[test]
    fn test_begin_request_only_before_first_sample() {
        let mut monitor = ConnectivityMonitor::new();
        let now = Instant::now();
        monitor.report(&Outcome::NoSubject, now);
        assert!(monitor.begin_request().is_none());
        assert_eq!(monitor.status(), ConnectivityStatus::Online);
    }

    #[test]
    fn test_reset_returns_to_connecting() {
        let mut monitor = ConnectivityMonitor::new();
        let now = Instant::now();
        monitor.report(&Outcome::NoSubject, now);
        assert_eq!(monitor.reset(), Some(ConnectivityStatus::Connecting));
        assert!(monitor.last_sample_at().is_none());
    }
}
