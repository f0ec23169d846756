//! # Plansync Provider
//!
//! Client for the external plan provider.
//!
//! One fetch is a single HTTP GET whose XML body is decoded into
//! [`ProviderPlanRecord`]s; plans not sold online are dropped. The call is
//! wrapped, outermost first, in a time limit, a circuit breaker and a retry
//! policy that only re-attempts transient failures.
//!
//! ## Example
//!
//! ```rust,no_run
//! use plansync_provider::{HttpProviderClient, ProviderClient, ProviderSettings};
//!
//! # async fn example() -> Result<(), plansync_provider::ProviderError> {
//! let client = HttpProviderClient::new(ProviderSettings::default())?;
//! let plans = client.fetch_plans().await?;
//! println!("{} online plans", plans.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod record;
pub mod xml;

pub use client::{DEFAULT_PROVIDER_URL, HttpProviderClient, ProviderClient, ProviderSettings};
pub use error::{ProviderError, ProviderErrorKind};
pub use record::{ProviderPlanRecord, ProviderZoneRecord};
