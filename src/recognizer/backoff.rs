//! Retry schedule for failed recognition calls

use std::time::Duration;

/// First retry delay
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Ceiling for the exponential schedule
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Delay to wait after the given failed attempt (1-based).
///
/// Doubles per attempt from a 1 s base, capped at 5 s: 1 s, 2 s, 4 s, 5 s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(30);
    let delay = BASE_DELAY.saturating_mul(1u32 << exponent);
    delay.min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(5));
        assert_eq!(backoff_delay(5), Duration::from_secs(5));
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(5));
    }
}
