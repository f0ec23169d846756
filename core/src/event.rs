//! Domain events emitted by plan reconciliation.
//!
//! Events are immutable facts. Each carries an [`EventMetadata`] with a unique
//! id and the instant it occurred, plus a payload describing what happened.
//! They are `Serialize` so outbound adapters can ship them as JSON.
//!
//! # Event Naming Convention
//!
//! [`PlanEvent::event_type`] returns a stable, versioned identifier such as
//! `"PlanSynced.v1"`. Bump the suffix when the payload shape changes.
//!
//! # Example
//!
//! ```
//! use plansync_core::event::{PlanEvent, PlanSyncFailed};
//! use plansync_core::ProviderPlanId;
//! use chrono::Utc;
//!
//! # fn example() -> Result<(), plansync_core::DomainError> {
//! let event = PlanEvent::from(PlanSyncFailed::new(
//!     ProviderPlanId::new("291")?,
//!     "database unavailable",
//!     Utc::now(),
//! ));
//! assert_eq!(event.event_type(), "PlanSyncFailed.v1");
//! # Ok(())
//! # }
//! ```

use crate::{DateRange, FieldChange, Plan, PlanChanges, PlanId, PriceRange, ProviderPlanId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize an event.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),
}

/// Identity and timestamp shared by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventMetadata {
    /// Unique id of this event instance.
    pub event_id: Uuid,
    /// When the event was raised.
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Fresh metadata with a random id.
    #[must_use]
    pub fn new(occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at,
        }
    }
}

/// A plan was seen for the first time and stored at version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSynced {
    /// Event identity.
    pub metadata: EventMetadata,
    /// Internal id.
    pub plan_id: PlanId,
    /// External natural key.
    pub provider_plan_id: ProviderPlanId,
    /// Title.
    pub title: String,
    /// Organizer reference.
    pub organizer_company_id: Option<String>,
    /// When the plan takes place.
    pub plan_date: DateRange,
    /// Price range.
    pub price_range: PriceRange,
    /// Sell window.
    pub sell_period: Option<DateRange>,
    /// Sold-out flag.
    pub sold_out: bool,
    /// Stored version.
    pub version: i64,
    /// When the plan was stored.
    pub synced_at: DateTime<Utc>,
}

impl PlanSynced {
    /// Snapshot a freshly created plan.
    #[must_use]
    pub fn from_plan(plan: &Plan, synced_at: DateTime<Utc>) -> Self {
        Self {
            metadata: EventMetadata::new(synced_at),
            plan_id: plan.id(),
            provider_plan_id: plan.provider_plan_id().clone(),
            title: plan.title().to_string(),
            organizer_company_id: plan.organizer_company_id().map(str::to_string),
            plan_date: plan.date(),
            price_range: plan.price_range(),
            sell_period: plan.sell_period(),
            sold_out: plan.sold_out(),
            version: plan.version(),
            synced_at,
        }
    }
}

/// A stored plan was replaced by a newer version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanUpdated {
    /// Event identity.
    pub metadata: EventMetadata,
    /// Internal id.
    pub plan_id: PlanId,
    /// External natural key.
    pub provider_plan_id: ProviderPlanId,
    /// Version before the update.
    pub previous_version: i64,
    /// Version after the update.
    pub new_version: i64,
    /// Title before the update.
    pub previous_title: String,
    /// Title after the update.
    pub new_title: String,
    /// Price range before the update.
    pub previous_price_range: PriceRange,
    /// Price range after the update.
    pub new_price_range: PriceRange,
    /// Plan date before the update.
    pub previous_date: DateRange,
    /// Plan date after the update.
    pub new_date: DateRange,
    /// Sell window before the update.
    pub previous_sell_period: Option<DateRange>,
    /// Sell window after the update.
    pub new_sell_period: Option<DateRange>,
    /// Sold-out flag before the update.
    pub previous_sold_out: bool,
    /// Sold-out flag after the update.
    pub new_sold_out: bool,
    /// Organizer before the update.
    pub previous_organizer_company_id: Option<String>,
    /// Organizer after the update.
    pub new_organizer_company_id: Option<String>,
    /// The material changes that triggered the update.
    pub changes: Vec<FieldChange>,
    /// When the update was stored.
    pub updated_at: DateTime<Utc>,
}

impl PlanUpdated {
    /// Describe the transition from `previous` to `current`.
    #[must_use]
    pub fn between(
        previous: &Plan,
        current: &Plan,
        changes: &PlanChanges,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(updated_at),
            plan_id: current.id(),
            provider_plan_id: current.provider_plan_id().clone(),
            previous_version: previous.version(),
            new_version: current.version(),
            previous_title: previous.title().to_string(),
            new_title: current.title().to_string(),
            previous_price_range: previous.price_range(),
            new_price_range: current.price_range(),
            previous_date: previous.date(),
            new_date: current.date(),
            previous_sell_period: previous.sell_period(),
            new_sell_period: current.sell_period(),
            previous_sold_out: previous.sold_out(),
            new_sold_out: current.sold_out(),
            previous_organizer_company_id: previous.organizer_company_id().map(str::to_string),
            new_organizer_company_id: current.organizer_company_id().map(str::to_string),
            changes: changes.iter().cloned().collect(),
            updated_at,
        }
    }
}

/// A plan could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSyncFailed {
    /// Event identity.
    pub metadata: EventMetadata,
    /// External natural key of the failed plan.
    pub provider_plan_id: ProviderPlanId,
    /// Human-readable cause.
    pub failure_reason: String,
    /// When reconciliation gave up.
    pub failed_at: DateTime<Utc>,
}

impl PlanSyncFailed {
    /// Record that `provider_plan_id` could not be reconciled.
    #[must_use]
    pub fn new(
        provider_plan_id: ProviderPlanId,
        failure_reason: impl Into<String>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(failed_at),
            provider_plan_id,
            failure_reason: failure_reason.into(),
            failed_at,
        }
    }
}

/// Every event the sync pipeline publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlanEvent {
    /// New plan stored.
    Synced(PlanSynced),
    /// Existing plan updated.
    Updated(PlanUpdated),
    /// Reconciliation failed.
    Failed(PlanSyncFailed),
}

impl PlanEvent {
    /// Stable, versioned event type identifier.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Synced(_) => "PlanSynced.v1",
            Self::Updated(_) => "PlanUpdated.v1",
            Self::Failed(_) => "PlanSyncFailed.v1",
        }
    }

    /// Event identity.
    #[must_use]
    pub const fn metadata(&self) -> &EventMetadata {
        match self {
            Self::Synced(e) => &e.metadata,
            Self::Updated(e) => &e.metadata,
            Self::Failed(e) => &e.metadata,
        }
    }

    /// External key of the plan the event is about.
    #[must_use]
    pub const fn provider_plan_id(&self) -> &ProviderPlanId {
        match self {
            Self::Synced(e) => &e.provider_plan_id,
            Self::Updated(e) => &e.provider_plan_id,
            Self::Failed(e) => &e.provider_plan_id,
        }
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if encoding fails.
    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }
}

impl From<PlanSynced> for PlanEvent {
    fn from(event: PlanSynced) -> Self {
        Self::Synced(event)
    }
}

impl From<PlanUpdated> for PlanEvent {
    fn from(event: PlanUpdated) -> Self {
        Self::Updated(event)
    }
}

impl From<PlanSyncFailed> for PlanEvent {
    fn from(event: PlanSyncFailed) -> Self {
        Self::Failed(event)
    }
}
