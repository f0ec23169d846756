//! Provider record to domain plan conversion.
//!
//! Records carry raw strings. Every value is parsed here, so a malformed
//! attribute fails exactly one record.

use chrono::{DateTime, NaiveDateTime, Utc};
use plansync_core::environment::Clock;
use plansync_core::{DateRange, DomainError, Plan, PlanId, ProviderPlanData, SellMode, Zone};
use plansync_provider::{ProviderPlanRecord, ProviderZoneRecord};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Timestamp layout used by the provider feed. Values carry no zone and are read as UTC.
pub const PROVIDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Why a provider record could not become a [`Plan`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The parsed values violate a domain invariant.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A required attribute is absent.
    #[error("Missing field {0}")]
    MissingField(&'static str),

    /// An attribute could not be parsed.
    #[error("Invalid {field}: {value:?}")]
    InvalidField {
        /// Attribute name.
        field: &'static str,
        /// Raw value as published.
        value: String,
    },
}

/// Parse a record into typed provider data.
///
/// # Errors
///
/// Returns a [`MappingError`] for missing or unparsable attributes and for
/// values that violate a domain invariant.
pub fn to_provider_data(record: &ProviderPlanRecord) -> Result<ProviderPlanData, MappingError> {
    let sell_mode = SellMode::from_str(&record.sell_mode)?;

    let starts = timestamp("plan_start_date", record.plan_start_date.as_deref())?;
    let ends = timestamp("plan_end_date", record.plan_end_date.as_deref())?;
    let date = DateRange::new(starts, ends)?;

    let sell_period = match (record.sell_from.as_deref(), record.sell_to.as_deref()) {
        (None, None) => None,
        (from, to) => Some(DateRange::new(
            timestamp("sell_from", from)?,
            timestamp("sell_to", to)?,
        )?),
    };

    let zones = record
        .zones
        .iter()
        .map(to_zone)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProviderPlanData {
        provider_plan_id: record.base_plan_id.clone(),
        title: record.title.clone(),
        date,
        sell_mode,
        organizer_company_id: record
            .organizer_company_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        sell_period,
        sold_out: flag(record.sold_out.as_deref()),
        zones,
    })
}

/// Build a fresh version-1 plan from a record, stamped with `clock`.
///
/// # Errors
///
/// Returns a [`MappingError`] when the record is not a valid plan.
pub fn to_plan(record: &ProviderPlanRecord, clock: &dyn Clock) -> Result<Plan, MappingError> {
    let data = to_provider_data(record)?;
    Ok(Plan::from_provider_data(PlanId::new(), data, clock.now())?)
}

fn to_zone(zone: &ProviderZoneRecord) -> Result<Zone, MappingError> {
    let price = Decimal::from_str(zone.price.trim()).map_err(|_| MappingError::InvalidField {
        field: "price",
        value: zone.price.clone(),
    })?;
    let capacity = zone
        .capacity
        .trim()
        .parse::<u32>()
        .map_err(|_| MappingError::InvalidField {
            field: "capacity",
            value: zone.capacity.clone(),
        })?;

    Ok(Zone::new(
        zone.zone_id.trim(),
        zone.name.trim(),
        price,
        capacity,
        flag(Some(&zone.numbered)),
    )?)
}

fn timestamp(field: &'static str, value: Option<&str>) -> Result<DateTime<Utc>, MappingError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(MappingError::MissingField(field))?;

    NaiveDateTime::parse_from_str(value, PROVIDER_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| MappingError::InvalidField {
            field,
            value: value.to_string(),
        })
}

// Anything but a case-insensitive "true" is false.
fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
