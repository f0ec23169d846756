//! # Plansync Core
//!
//! Domain model and ports for the plan inventory sync pipeline.
//!
//! This crate has no I/O. It provides:
//!
//! - **Value types**: [`DateRange`], [`PriceRange`], [`Zone`], [`PlanId`], [`ProviderPlanId`]
//! - **Aggregate**: [`Plan`] with creation from provider data, tolerant change
//!   detection and versioned updates
//! - **Events**: [`event::PlanEvent`] and its payloads
//! - **Ports**: [`repository::PlanRepository`], [`publisher::DomainEventPublisher`],
//!   [`environment::Clock`]
//!
//! ## Example
//!
//! ```
//! use plansync_core::{DateRange, Plan, PlanId, ProviderPlanData, SellMode, Zone};
//! use chrono::{TimeZone, Utc};
//! use rust_decimal::Decimal;
//!
//! # fn example() -> Result<(), plansync_core::DomainError> {
//! let starts = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();
//! let ends = Utc.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap();
//!
//! let plan = Plan::from_provider_data(
//!     PlanId::new(),
//!     ProviderPlanData {
//!         provider_plan_id: "291".to_string(),
//!         title: "Camela en concierto".to_string(),
//!         date: DateRange::new(starts, ends)?,
//!         sell_mode: SellMode::Online,
//!         organizer_company_id: None,
//!         sell_period: None,
//!         sold_out: false,
//!         zones: vec![Zone::new("40", "Platea", Decimal::new(2000, 2), 243, true)?],
//!     },
//!     Utc::now(),
//! )?;
//!
//! assert_eq!(plan.version(), 1);
//! # Ok(())
//! # }
//! ```

pub mod date_range;
pub mod error;
pub mod event;
pub mod ids;
pub mod plan;
pub mod price_range;
pub mod publisher;
pub mod repository;
pub mod zone;

pub use date_range::DateRange;
pub use error::DomainError;
pub use ids::{PlanId, ProviderPlanId};
pub use plan::{
    FieldChange, INITIAL_VERSION, Plan, PlanChanges, PlanSnapshot, ProviderPlanData, SellMode,
};
pub use price_range::PriceRange;
pub use zone::Zone;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;

/// Environment traits injected into services.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use plansync_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
