//! Controllable clock.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use plansync_core::environment::Clock;
use std::sync::{Arc, RwLock};

/// [`Clock`] that only moves when told to.
///
/// Clones share the same instant, so a test can keep a handle and advance
/// time seen by the code under test.
///
/// ```
/// use plansync_testing::{FixedClock, test_clock};
/// use plansync_core::environment::Clock;
/// use chrono::TimeDelta;
///
/// let clock = test_clock();
/// let before = clock.now();
/// clock.advance(TimeDelta::minutes(5));
/// assert_eq!(clock.now() - before, TimeDelta::minutes(5));
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    /// Clock stopped at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        *self.now.write().unwrap() += delta;
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

/// Clock stopped at 2025-01-01T00:00:00Z.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_new_year_and_only_moves_on_request() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(clock.now(), clock.now());

        let shared = clock.clone();
        shared.advance(TimeDelta::hours(1));
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T01:00:00+00:00");

        clock.set(Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(shared.now().to_rfc3339(), "2030-06-01T12:00:00+00:00");
    }
}
