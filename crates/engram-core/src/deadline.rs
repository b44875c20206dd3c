//! Cooperative deadline token passed through long-running operations.

use std::time::{Duration, Instant};

/// A deadline checked between units of work. Operations that observe an
/// expired deadline return partial results with a `cancelled` marker and
/// never stop mid-transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub const NONE: Deadline = Deadline(None);

    /// Expire after `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// Expire at an absolute instant.
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Time remaining, if bounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_expires() {
        assert!(!Deadline::NONE.expired());
        assert_eq!(Deadline::NONE.remaining(), None);
    }

    #[test]
    fn past_deadline_is_expired() {
        let d = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(d.expired());
    }

    #[test]
    fn future_deadline_is_not_expired() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(!d.expired());
        assert!(d.remaining().unwrap() > Duration::from_secs(30));
    }
}
