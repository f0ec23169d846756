//! The `Plan` aggregate.
//!
//! A plan is a sellable event: a time window, a set of priced zones and a sell
//! window. Plans are created from provider data the first time their
//! [`ProviderPlanId`] is seen and replaced wholesale through
//! [`Plan::update_from_provider`] whenever the provider reports a material
//! change. [`Plan::changes_from`] decides what counts as material.

use crate::{DateRange, DomainError, PlanId, PriceRange, ProviderPlanId, Zone};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Version assigned to a freshly created plan.
pub const INITIAL_VERSION: i64 = 1;

/// How tickets for a plan are sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SellMode {
    /// Sold through the online channel. The only mode this system accepts.
    Online,
    /// Sold at the box office only.
    Offline,
}

impl SellMode {
    /// Lower-case wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for SellMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("online") {
            Ok(Self::Online)
        } else if value.eq_ignore_ascii_case("offline") {
            Ok(Self::Offline)
        } else {
            Err(DomainError::UnsupportedSellMode)
        }
    }
}

impl fmt::Display for SellMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed provider input for [`Plan::from_provider_data`].
#[derive(Debug, Clone)]
pub struct ProviderPlanData {
    /// External natural key.
    pub provider_plan_id: String,
    /// Display title.
    pub title: String,
    /// When the plan takes place.
    pub date: DateRange,
    /// Sales channel.
    pub sell_mode: SellMode,
    /// Organizer reference, if the provider sent one.
    pub organizer_company_id: Option<String>,
    /// When tickets can be bought.
    pub sell_period: Option<DateRange>,
    /// Whether every zone is sold out.
    pub sold_out: bool,
    /// Priced zones, in feed order.
    pub zones: Vec<Zone>,
}

/// Flat, persistence-facing view of a plan.
///
/// Repositories read rows into a snapshot and call [`Plan::restore`], which
/// re-checks the invariants.
#[derive(Debug, Clone)]
pub struct PlanSnapshot {
    /// Internal id.
    pub id: PlanId,
    /// External natural key.
    pub provider_plan_id: String,
    /// Title.
    pub title: String,
    /// When the plan takes place.
    pub date: DateRange,
    /// Stored price range.
    pub price_range: PriceRange,
    /// Sales channel.
    pub sell_mode: SellMode,
    /// Organizer reference.
    pub organizer_company_id: Option<String>,
    /// Sell window.
    pub sell_period: Option<DateRange>,
    /// Sold-out flag.
    pub sold_out: bool,
    /// Zones in stored order.
    pub zones: Vec<Zone>,
    /// Last successful reconciliation.
    pub last_updated: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: i64,
}

/// Plan aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    id: PlanId,
    provider_plan_id: ProviderPlanId,
    title: String,
    date: DateRange,
    price_range: PriceRange,
    sell_mode: SellMode,
    organizer_company_id: Option<String>,
    sell_period: Option<DateRange>,
    sold_out: bool,
    zones: Vec<Zone>,
    last_updated: DateTime<Utc>,
    version: i64,
}

impl Plan {
    /// Build a new plan at [`INITIAL_VERSION`] from provider data.
    ///
    /// The price range is derived from the cheapest and most expensive zone.
    ///
    /// # Errors
    ///
    /// Fails when the provider id or title is blank, the plan is not sold
    /// online, or there are no zones.
    pub fn from_provider_data(
        id: PlanId,
        data: ProviderPlanData,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let provider_plan_id = ProviderPlanId::new(data.provider_plan_id)?;
        let title = normalize_title(&data.title)?;
        if data.sell_mode != SellMode::Online {
            return Err(DomainError::UnsupportedSellMode);
        }
        let price_range = price_range_of(&data.zones)?;

        Ok(Self {
            id,
            provider_plan_id,
            title,
            date: data.date,
            price_range,
            sell_mode: data.sell_mode,
            organizer_company_id: data.organizer_company_id,
            sell_period: data.sell_period,
            sold_out: data.sold_out,
            zones: data.zones,
            last_updated: now,
            version: INITIAL_VERSION,
        })
    }

    /// Rebuild a persisted plan.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot violates any plan invariant.
    pub fn restore(snapshot: PlanSnapshot) -> Result<Self, DomainError> {
        let provider_plan_id = ProviderPlanId::new(snapshot.provider_plan_id)?;
        let title = normalize_title(&snapshot.title)?;
        if snapshot.sell_mode != SellMode::Online {
            return Err(DomainError::UnsupportedSellMode);
        }
        if snapshot.version < INITIAL_VERSION {
            return Err(DomainError::InvalidVersion(snapshot.version));
        }

        Ok(Self {
            id: snapshot.id,
            provider_plan_id,
            title,
            date: snapshot.date,
            price_range: snapshot.price_range,
            sell_mode: snapshot.sell_mode,
            organizer_company_id: snapshot.organizer_company_id,
            sell_period: snapshot.sell_period,
            sold_out: snapshot.sold_out,
            zones: snapshot.zones,
            last_updated: snapshot.last_updated,
            version: snapshot.version,
        })
    }

    /// Flatten into a [`PlanSnapshot`].
    #[must_use]
    pub fn to_snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            id: self.id,
            provider_plan_id: self.provider_plan_id.as_str().to_string(),
            title: self.title.clone(),
            date: self.date,
            price_range: self.price_range,
            sell_mode: self.sell_mode,
            organizer_company_id: self.organizer_company_id.clone(),
            sell_period: self.sell_period,
            sold_out: self.sold_out,
            zones: self.zones.clone(),
            last_updated: self.last_updated,
            version: self.version,
        }
    }

    /// Field-level diff between `self` (stored) and `incoming` (fresh from the
    /// provider), using tolerant comparison for dates and prices.
    ///
    /// Zones are not compared on their own; a zone change that matters shows up
    /// through the derived price range.
    #[must_use]
    pub fn changes_from(&self, incoming: &Self) -> PlanChanges {
        let mut changes = Vec::new();

        if self.title != incoming.title {
            changes.push(FieldChange::Title {
                previous: self.title.clone(),
                new: incoming.title.clone(),
            });
        }
        if !self.price_range.is_equivalent_to(&incoming.price_range) {
            changes.push(FieldChange::PriceRange {
                previous: self.price_range,
                new: incoming.price_range,
            });
        }
        if !self.date.is_equivalent_to(&incoming.date) {
            changes.push(FieldChange::Date {
                previous: self.date,
                new: incoming.date,
            });
        }
        if self.sold_out != incoming.sold_out {
            changes.push(FieldChange::SoldOut {
                previous: self.sold_out,
                new: incoming.sold_out,
            });
        }
        if self.organizer_company_id != incoming.organizer_company_id {
            changes.push(FieldChange::OrganizerCompanyId {
                previous: self.organizer_company_id.clone(),
                new: incoming.organizer_company_id.clone(),
            });
        }
        let same_sell_period = match (&self.sell_period, &incoming.sell_period) {
            (None, None) => true,
            (Some(current), Some(next)) => current.is_equivalent_to(next),
            _ => false,
        };
        if !same_sell_period {
            changes.push(FieldChange::SellPeriod {
                previous: self.sell_period,
                new: incoming.sell_period,
            });
        }

        PlanChanges(changes)
    }

    /// Produce the next version of this plan carrying `incoming`'s content.
    ///
    /// `id`, `provider_plan_id` and `sell_mode` are kept; every other field is
    /// replaced. The version goes up by exactly one.
    #[must_use]
    pub fn update_from_provider(&self, incoming: &Self, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            provider_plan_id: self.provider_plan_id.clone(),
            title: incoming.title.trim().to_string(),
            date: incoming.date,
            price_range: incoming.price_range,
            sell_mode: self.sell_mode,
            organizer_company_id: incoming.organizer_company_id.clone(),
            sell_period: incoming.sell_period,
            sold_out: incoming.sold_out,
            zones: incoming.zones.clone(),
            last_updated: now,
            version: self.version + 1,
        }
    }

    /// Tickets can be bought at `now`.
    #[must_use]
    pub fn is_currently_on_sale(&self, now: DateTime<Utc>) -> bool {
        !self.sold_out
            && self
                .sell_period
                .is_some_and(|period| period.contains(now))
    }

    /// The plan takes place at some point within `range`.
    #[must_use]
    pub fn is_happening_in(&self, range: &DateRange) -> bool {
        self.date.overlaps_with(range)
    }

    /// Internal id.
    #[must_use]
    pub const fn id(&self) -> PlanId {
        self.id
    }

    /// External natural key.
    #[must_use]
    pub const fn provider_plan_id(&self) -> &ProviderPlanId {
        &self.provider_plan_id
    }

    /// Title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// When the plan takes place.
    #[must_use]
    pub const fn date(&self) -> DateRange {
        self.date
    }

    /// Price range.
    #[must_use]
    pub const fn price_range(&self) -> PriceRange {
        self.price_range
    }

    /// Sales channel.
    #[must_use]
    pub const fn sell_mode(&self) -> SellMode {
        self.sell_mode
    }

    /// Organizer reference.
    #[must_use]
    pub fn organizer_company_id(&self) -> Option<&str> {
        self.organizer_company_id.as_deref()
    }

    /// Sell window.
    #[must_use]
    pub const fn sell_period(&self) -> Option<DateRange> {
        self.sell_period
    }

    /// Sold-out flag.
    #[must_use]
    pub const fn sold_out(&self) -> bool {
        self.sold_out
    }

    /// Zones in feed order.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Last successful reconciliation.
    #[must_use]
    pub const fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Optimistic concurrency version.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }
}

fn normalize_title(title: &str) -> Result<String, DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::BlankTitle);
    }
    Ok(trimmed.to_string())
}

fn price_range_of(zones: &[Zone]) -> Result<PriceRange, DomainError> {
    let mut prices = zones.iter().map(Zone::price);
    let first = prices.next().ok_or(DomainError::NoZones)?;
    let (min, max) = prices.fold((first, first), |(min, max), price| {
        (min.min(price), max.max(price))
    });
    PriceRange::new(min, max)
}

/// One materially changed field with its before and after values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    /// Title changed.
    Title {
        /// Stored value.
        previous: String,
        /// Incoming value.
        new: String,
    },
    /// Price range changed beyond currency precision.
    PriceRange {
        /// Stored value.
        previous: PriceRange,
        /// Incoming value.
        new: PriceRange,
    },
    /// Plan date changed by at least a minute.
    Date {
        /// Stored value.
        previous: DateRange,
        /// Incoming value.
        new: DateRange,
    },
    /// Sold-out flag flipped.
    SoldOut {
        /// Stored value.
        previous: bool,
        /// Incoming value.
        new: bool,
    },
    /// Organizer changed.
    OrganizerCompanyId {
        /// Stored value.
        previous: Option<String>,
        /// Incoming value.
        new: Option<String>,
    },
    /// Sell window appeared, vanished or moved by at least a minute.
    SellPeriod {
        /// Stored value.
        previous: Option<DateRange>,
        /// Incoming value.
        new: Option<DateRange>,
    },
}

impl FieldChange {
    /// Snake-case name of the changed field.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::Title { .. } => "title",
            Self::PriceRange { .. } => "price_range",
            Self::Date { .. } => "date",
            Self::SoldOut { .. } => "sold_out",
            Self::OrganizerCompanyId { .. } => "organizer_company_id",
            Self::SellPeriod { .. } => "sell_period",
        }
    }
}

/// Result of [`Plan::changes_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlanChanges(Vec<FieldChange>);

impl PlanChanges {
    /// Nothing material changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the changes.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldChange> {
        self.0.iter()
    }

    /// Names of the changed fields.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.0.iter().map(FieldChange::field_name).collect()
    }

    /// Whether `field` is among the changes.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|change| change.field_name() == field)
    }
}

impl<'a> IntoIterator for &'a PlanChanges {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for PlanChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no changes");
        }
        f.write_str(&self.field_names().join(", "))
    }
}
