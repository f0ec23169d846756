//! Builders for provider records and domain plans.
//!
//! Defaults describe one online concert with a single 25.00 zone, so a test
//! only spells out the fields it cares about.

#![allow(clippy::expect_used)]
#![allow(clippy::missing_panics_doc)]

use crate::clock::test_clock;
use chrono::{DateTime, NaiveDateTime, Utc};
use plansync_core::environment::Clock;
use plansync_core::{DateRange, Plan, PlanId, ProviderPlanData, SellMode, Zone};
use plansync_provider::{ProviderPlanRecord, ProviderZoneRecord};
use rust_decimal::Decimal;
use std::str::FromStr;

const DEFAULT_START: &str = "2025-06-01T20:00:00";
const DEFAULT_END: &str = "2025-06-01T22:00:00";
const DEFAULT_SELL_FROM: &str = "2025-01-01T00:00:00";
const DEFAULT_SELL_TO: &str = "2025-06-01T19:00:00";

/// Parse a decimal literal such as `"25.00"`.
#[must_use]
pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal literal")
}

/// Parse a provider-style timestamp (`yyyy-MM-ddTHH:mm:ss`) as UTC.
#[must_use]
pub fn utc(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .expect("valid timestamp literal")
        .and_utc()
}

/// Builder for [`ProviderPlanRecord`]s as the provider client returns them.
#[derive(Debug, Clone)]
pub struct PlanRecordBuilder {
    record: ProviderPlanRecord,
}

impl PlanRecordBuilder {
    /// An online plan with one zone priced 25.00.
    #[must_use]
    pub fn new(base_plan_id: &str) -> Self {
        Self {
            record: ProviderPlanRecord {
                base_plan_id: base_plan_id.to_string(),
                title: "Concert".to_string(),
                sell_mode: "online".to_string(),
                organizer_company_id: None,
                plan_start_date: Some(DEFAULT_START.to_string()),
                plan_end_date: Some(DEFAULT_END.to_string()),
                sell_from: Some(DEFAULT_SELL_FROM.to_string()),
                sell_to: Some(DEFAULT_SELL_TO.to_string()),
                sold_out: Some("false".to_string()),
                zones: vec![zone("1", "Platea", "25.00")],
            },
        }
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.record.title = title.to_string();
        self
    }

    /// Set the sell mode.
    #[must_use]
    pub fn sell_mode(mut self, sell_mode: &str) -> Self {
        self.record.sell_mode = sell_mode.to_string();
        self
    }

    /// Set the organizer.
    #[must_use]
    pub fn organizer(mut self, organizer_company_id: &str) -> Self {
        self.record.organizer_company_id = Some(organizer_company_id.to_string());
        self
    }

    /// Set the plan start and end timestamps.
    #[must_use]
    pub fn dates(mut self, start: &str, end: &str) -> Self {
        self.record.plan_start_date = Some(start.to_string());
        self.record.plan_end_date = Some(end.to_string());
        self
    }

    /// Drop the plan start and end timestamps.
    #[must_use]
    pub fn without_dates(mut self) -> Self {
        self.record.plan_start_date = None;
        self.record.plan_end_date = None;
        self
    }

    /// Set the sell window.
    #[must_use]
    pub fn sell_period(mut self, from: &str, to: &str) -> Self {
        self.record.sell_from = Some(from.to_string());
        self.record.sell_to = Some(to.to_string());
        self
    }

    /// Drop the sell window.
    #[must_use]
    pub fn without_sell_period(mut self) -> Self {
        self.record.sell_from = None;
        self.record.sell_to = None;
        self
    }

    /// Set the sold-out flag.
    #[must_use]
    pub fn sold_out(mut self, sold_out: bool) -> Self {
        self.record.sold_out = Some(sold_out.to_string());
        self
    }

    /// Replace all zones with a single one at `price`.
    #[must_use]
    pub fn price(mut self, price: &str) -> Self {
        self.record.zones = vec![zone("1", "Platea", price)];
        self
    }

    /// Append a zone.
    #[must_use]
    pub fn zone(mut self, zone_id: &str, name: &str, price: &str) -> Self {
        self.record.zones.push(zone(zone_id, name, price));
        self
    }

    /// Append a fully specified zone.
    #[must_use]
    pub fn raw_zone(mut self, zone: ProviderZoneRecord) -> Self {
        self.record.zones.push(zone);
        self
    }

    /// Remove all zones.
    #[must_use]
    pub fn without_zones(mut self) -> Self {
        self.record.zones.clear();
        self
    }

    /// Finish the record.
    #[must_use]
    pub fn build(self) -> ProviderPlanRecord {
        self.record
    }
}

fn zone(zone_id: &str, name: &str, price: &str) -> ProviderZoneRecord {
    ProviderZoneRecord {
        zone_id: zone_id.to_string(),
        name: name.to_string(),
        price: price.to_string(),
        capacity: "100".to_string(),
        numbered: "true".to_string(),
    }
}

/// Builder for domain [`Plan`]s at version 1.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    provider_plan_id: String,
    title: String,
    date: (DateTime<Utc>, DateTime<Utc>),
    sell_period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    organizer_company_id: Option<String>,
    sold_out: bool,
    prices: Vec<Decimal>,
    now: DateTime<Utc>,
}

impl PlanBuilder {
    /// An online concert with one zone priced 25.00, stamped with [`test_clock`].
    #[must_use]
    pub fn new(provider_plan_id: &str) -> Self {
        Self {
            provider_plan_id: provider_plan_id.to_string(),
            title: "Concert".to_string(),
            date: (utc(DEFAULT_START), utc(DEFAULT_END)),
            sell_period: Some((utc(DEFAULT_SELL_FROM), utc(DEFAULT_SELL_TO))),
            organizer_company_id: None,
            sold_out: false,
            prices: vec![dec("25.00")],
            now: test_clock().now(),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Set the plan date.
    #[must_use]
    pub fn date(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date = (from, to);
        self
    }

    /// Set the sell window.
    #[must_use]
    pub fn sell_period(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.sell_period = Some((from, to));
        self
    }

    /// Drop the sell window.
    #[must_use]
    pub fn without_sell_period(mut self) -> Self {
        self.sell_period = None;
        self
    }

    /// Set the organizer.
    #[must_use]
    pub fn organizer(mut self, organizer_company_id: &str) -> Self {
        self.organizer_company_id = Some(organizer_company_id.to_string());
        self
    }

    /// Set the sold-out flag.
    #[must_use]
    pub const fn sold_out(mut self, sold_out: bool) -> Self {
        self.sold_out = sold_out;
        self
    }

    /// One zone per price, in order.
    #[must_use]
    pub fn prices(mut self, prices: &[&str]) -> Self {
        self.prices = prices.iter().map(|p| dec(p)).collect();
        self
    }

    /// Set `last_updated`.
    #[must_use]
    pub const fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Build the plan.
    #[must_use]
    pub fn build(self) -> Plan {
        let zones = self
            .prices
            .iter()
            .enumerate()
            .map(|(i, price)| {
                Zone::new((i + 1).to_string(), format!("Zone {}", i + 1), *price, 100, true)
                    .expect("valid zone")
            })
            .collect();

        Plan::from_provider_data(
            PlanId::new(),
            ProviderPlanData {
                provider_plan_id: self.provider_plan_id,
                title: self.title,
                date: DateRange::new(self.date.0, self.date.1).expect("valid plan date"),
                sell_mode: SellMode::Online,
                organizer_company_id: self.organizer_company_id,
                sell_period: self
                    .sell_period
                    .map(|(from, to)| DateRange::new(from, to).expect("valid sell period")),
                sold_out: self.sold_out,
                zones,
            },
            self.now,
        )
        .expect("valid plan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_are_online_with_one_zone() {
        let record = PlanRecordBuilder::new("P1").build();
        assert!(record.is_online());
        assert_eq!(record.zones.len(), 1);
        assert_eq!(record.zones[0].price, "25.00");
    }

    #[test]
    fn test_plan_builder_derives_price_range() {
        let plan = PlanBuilder::new("P1").prices(&["10.00", "40.50"]).build();
        assert_eq!(plan.price_range().min(), dec("10.00"));
        assert_eq!(plan.price_range().max(), dec("40.50"));
        assert_eq!(plan.version(), 1);
        assert_eq!(plan.last_updated(), test_clock().now());
    }
}
