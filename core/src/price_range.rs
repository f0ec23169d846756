//! Monetary interval value type.

use crate::DomainError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Currency precision used by [`PriceRange::is_equivalent_to`].
const CURRENCY_SCALE: u32 = 2;

/// Cheapest and most expensive price of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PriceRange {
    min: Decimal,
    max: Decimal,
}

impl PriceRange {
    /// Create a range.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NegativeMinPrice`], [`DomainError::NegativeMaxPrice`]
    /// or [`DomainError::InvertedPriceRange`] when `0 <= min <= max` does not hold.
    pub fn new(min: Decimal, max: Decimal) -> Result<Self, DomainError> {
        if min < Decimal::ZERO {
            return Err(DomainError::NegativeMinPrice);
        }
        if max < Decimal::ZERO {
            return Err(DomainError::NegativeMaxPrice);
        }
        if min > max {
            return Err(DomainError::InvertedPriceRange);
        }
        Ok(Self { min, max })
    }

    /// A range for free admission.
    #[must_use]
    pub const fn free() -> Self {
        Self {
            min: Decimal::ZERO,
            max: Decimal::ZERO,
        }
    }

    /// A single-price range.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NegativeMinPrice`] for a negative price.
    pub fn fixed(price: Decimal) -> Result<Self, DomainError> {
        Self::new(price, price)
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> Decimal {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> Decimal {
        self.max
    }

    /// Inclusive containment.
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        self.min <= price && price <= self.max
    }

    /// Whether even the most expensive ticket fits `budget`.
    #[must_use]
    pub fn is_within_budget(&self, budget: Decimal) -> bool {
        self.max <= budget
    }

    /// Midpoint of the range.
    #[must_use]
    pub fn average_price(&self) -> Decimal {
        (self.min + self.max) / Decimal::TWO
    }

    /// Distance between the bounds.
    #[must_use]
    pub fn price_spread(&self) -> Decimal {
        self.max - self.min
    }

    /// `true` when every ticket costs the same.
    #[must_use]
    pub fn is_fixed_price(&self) -> bool {
        self.min == self.max
    }

    /// Equality at currency precision.
    ///
    /// Both endpoints are rounded to two decimal places with midpoints going
    /// to the even neighbour, so `10.005` and `10.00` compare equal while
    /// `10.01` and `10.00` do not.
    #[must_use]
    pub fn is_equivalent_to(&self, other: &Self) -> bool {
        to_cents(self.min) == to_cents(other.min) && to_cents(self.max) == to_cents(other.max)
    }
}

fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointNearestEven)
}
