//! Validation errors raised by the domain model.

use thiserror::Error;

/// Errors produced when a domain value or entity would violate an invariant.
///
/// Every constructor in this crate validates eagerly, so holding a value of a
/// domain type is proof that its invariants hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A date range whose start is not strictly before its end.
    #[error("Start date must be before end date")]
    InvalidDateRange,

    /// Negative lower bound on a price range.
    #[error("Min price cannot be negative")]
    NegativeMinPrice,

    /// Negative upper bound on a price range.
    #[error("Max price cannot be negative")]
    NegativeMaxPrice,

    /// Lower bound above upper bound.
    #[error("Min price cannot be greater than max price")]
    InvertedPriceRange,

    /// Negative zone price.
    #[error("Zone price cannot be negative")]
    NegativeZonePrice,

    /// Title empty or whitespace only.
    #[error("Title cannot be blank")]
    BlankTitle,

    /// External identifier empty or whitespace only.
    #[error("Provider plan ID cannot be blank")]
    BlankProviderPlanId,

    /// Sell mode other than online.
    #[error("Only online plans are allowed")]
    UnsupportedSellMode,

    /// Plan built from provider data without any zone.
    #[error("Plan must have at least one zone")]
    NoZones,

    /// Version counter below the first version.
    #[error("Version must be at least 1, got {0}")]
    InvalidVersion(i64),
}
