/*!
 * Utility functions and helpers for Portlink.
 */
use std::time::{Duration, Instant};

/// A monotonic deadline for blocking waits.
///
/// Guaranteed never to report expiry before the full timeout has
/// elapsed, regardless of scheduler slack in the waits between checks.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Instant,
}

impl Deadline {
    /// Create a deadline expiring after the given duration
    pub fn after(timeout: Duration) -> Self {
        Self {
            end: Instant::now() + timeout,
        }
    }

    /// Whether the deadline has expired
    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    /// The time remaining until expiry (zero if expired)
    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Convert a duration to milliseconds
pub fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Convert milliseconds to a duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_not_expired_immediately() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.expired());
        assert!(deadline.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn test_deadline_expires() {
        let deadline = Deadline::after(Duration::from_millis(0));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_millis_conversions() {
        assert_eq!(duration_to_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis_to_duration(250), Duration::from_millis(250));
    }
}
