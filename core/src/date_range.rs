//! Time interval value type.

use crate::DomainError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// A half-open-looking interval with a strictly positive length.
///
/// Used both for when a plan takes place and for its sell window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl DateRange {
    /// Create a range.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidDateRange`] unless `from < to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, DomainError> {
        if from >= to {
            return Err(DomainError::InvalidDateRange);
        }
        Ok(Self { from, to })
    }

    /// Start of the range.
    #[must_use]
    pub const fn from(&self) -> DateTime<Utc> {
        self.from
    }

    /// End of the range.
    #[must_use]
    pub const fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Length of the range.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.to - self.from
    }

    /// `true` when `self.from < other.to && self.to >= other.from`.
    #[must_use]
    pub fn overlaps_with(&self, other: &Self) -> bool {
        self.from < other.to && self.to >= other.from
    }

    /// Inclusive containment check for a single instant.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }

    /// Equality at minute precision.
    ///
    /// Repeated provider fetches may jitter by seconds; those must not count
    /// as changes.
    #[must_use]
    pub fn is_equivalent_to(&self, other: &Self) -> bool {
        minute_of(self.from) == minute_of(other.from) && minute_of(self.to) == minute_of(other.to)
    }
}

fn minute_of(instant: DateTime<Utc>) -> i64 {
    instant.timestamp().div_euclid(60)
}
