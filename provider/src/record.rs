//! Normalized provider records.
//!
//! Values are kept exactly as the feed delivered them. Turning them into
//! typed domain values is the job of the mapping step, so one malformed
//! attribute rejects one record instead of the whole feed.

/// One plan as published by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderPlanRecord {
    /// Provider's identifier for the plan
    pub base_plan_id: String,
    /// Display title
    pub title: String,
    /// Sell mode as published (e.g. `online`)
    pub sell_mode: String,
    /// Organizer company, when published
    pub organizer_company_id: Option<String>,
    /// Start of the plan, `yyyy-MM-ddTHH:mm:ss`
    pub plan_start_date: Option<String>,
    /// End of the plan, `yyyy-MM-ddTHH:mm:ss`
    pub plan_end_date: Option<String>,
    /// Start of the sell period
    pub sell_from: Option<String>,
    /// End of the sell period
    pub sell_to: Option<String>,
    /// Sold-out flag as published
    pub sold_out: Option<String>,
    /// Zones in feed order
    pub zones: Vec<ProviderZoneRecord>,
}

impl ProviderPlanRecord {
    /// Whether the plan is sold online. Comparison ignores case.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.sell_mode.trim().eq_ignore_ascii_case("online")
    }
}

/// One priced zone of a [`ProviderPlanRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderZoneRecord {
    /// Provider zone id
    pub zone_id: String,
    /// Zone name
    pub name: String,
    /// Decimal price
    pub price: String,
    /// Seat count
    pub capacity: String,
    /// Numbered-seating flag
    pub numbered: String,
}
