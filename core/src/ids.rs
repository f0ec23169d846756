//! Identifier newtypes.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Internal identifier of a [`Plan`](crate::plan::Plan).
///
/// Generated locally when a provider record is first mapped. The provider's
/// own key lives in [`ProviderPlanId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlanId(Uuid);

impl PlanId {
    /// Generate a new random plan id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External natural key assigned by the provider.
///
/// Immutable once a plan has been created; the unit of upsert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProviderPlanId(String);

impl ProviderPlanId {
    /// Create a provider plan id, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::BlankProviderPlanId`](crate::DomainError::BlankProviderPlanId)
    /// when the value is empty or whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, crate::DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(crate::DomainError::BlankProviderPlanId);
        }
        Ok(Self(value))
    }

    /// Borrow the raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_ids_are_unique() {
        assert_ne!(PlanId::new(), PlanId::new());
    }

    #[test]
    fn plan_id_round_trips_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(PlanId::from_uuid(uuid).as_uuid(), &uuid);
    }

    #[test]
    fn blank_provider_id_rejected() {
        assert!(ProviderPlanId::new("  ").is_err());
        assert_eq!(
            ProviderPlanId::new("291").map(|id| id.to_string()),
            Ok("291".to_string())
        );
    }
}
