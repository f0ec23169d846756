//! Seating zone of a plan.

use crate::DomainError;
use rust_decimal::Decimal;
use serde::Serialize;

/// A priced section of a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    id: String,
    name: String,
    price: Decimal,
    capacity: u32,
    numbered: bool,
}

impl Zone {
    /// Create a zone.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NegativeZonePrice`] for a price below zero.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        capacity: u32,
        numbered: bool,
    ) -> Result<Self, DomainError> {
        if price < Decimal::ZERO {
            return Err(DomainError::NegativeZonePrice);
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            price,
            capacity,
            numbered,
        })
    }

    /// Provider zone id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ticket price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Seats available in the zone.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether seats are numbered.
    #[must_use]
    pub const fn numbered(&self) -> bool {
        self.numbered
    }
}
