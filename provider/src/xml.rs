//! Decoding of the provider's XML feed.
//!
//! ```xml
//! <planList version="1.0">
//!   <output>
//!     <base_plan base_plan_id="291" sell_mode="online" title="Camela en concierto">
//!       <plan plan_start_date="2021-06-30T21:00:00" plan_end_date="2021-06-30T22:00:00"
//!             sell_from="2020-07-01T00:00:00" sell_to="2021-06-30T20:00:00" sold_out="false">
//!         <zone zone_id="40" capacity="243" price="20.00" name="Platea" numbered="true"/>
//!       </plan>
//!     </base_plan>
//!   </output>
//! </planList>
//! ```
//!
//! The older `eventList`/`base_event`/`event` naming is accepted as well.

use crate::error::ProviderError;
use crate::record::{ProviderPlanRecord, ProviderZoneRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PlanListXml {
    #[serde(default)]
    output: Option<OutputXml>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputXml {
    #[serde(rename = "base_plan", alias = "base_event", default)]
    base_plans: Vec<BasePlanXml>,
}

#[derive(Debug, Deserialize)]
struct BasePlanXml {
    #[serde(rename = "@base_plan_id", alias = "@base_event_id", default)]
    base_plan_id: String,
    #[serde(rename = "@sell_mode", default)]
    sell_mode: String,
    #[serde(rename = "@title", default)]
    title: String,
    #[serde(rename = "@organizer_company_id", default)]
    organizer_company_id: Option<String>,
    #[serde(rename = "plan", alias = "event", default)]
    plans: Vec<PlanXml>,
}

#[derive(Debug, Deserialize)]
struct PlanXml {
    #[serde(rename = "@plan_start_date", alias = "@event_start_date", default)]
    plan_start_date: Option<String>,
    #[serde(rename = "@plan_end_date", alias = "@event_end_date", default)]
    plan_end_date: Option<String>,
    #[serde(rename = "@sell_from", default)]
    sell_from: Option<String>,
    #[serde(rename = "@sell_to", default)]
    sell_to: Option<String>,
    #[serde(rename = "@sold_out", default)]
    sold_out: Option<String>,
    #[serde(rename = "zone", default)]
    zones: Vec<ZoneXml>,
}

#[derive(Debug, Deserialize)]
struct ZoneXml {
    #[serde(rename = "@zone_id", default)]
    zone_id: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@price", default)]
    price: String,
    #[serde(rename = "@capacity", default)]
    capacity: String,
    #[serde(rename = "@numbered", default)]
    numbered: String,
}

impl BasePlanXml {
    fn into_record(self) -> ProviderPlanRecord {
        let mut record = ProviderPlanRecord {
            base_plan_id: self.base_plan_id,
            title: self.title,
            sell_mode: self.sell_mode,
            organizer_company_id: self.organizer_company_id,
            ..ProviderPlanRecord::default()
        };

        // Only the first occurrence describes the plan.
        if let Some(plan) = self.plans.into_iter().next() {
            record.plan_start_date = plan.plan_start_date;
            record.plan_end_date = plan.plan_end_date;
            record.sell_from = plan.sell_from;
            record.sell_to = plan.sell_to;
            record.sold_out = plan.sold_out;
            record.zones = plan
                .zones
                .into_iter()
                .map(|zone| ProviderZoneRecord {
                    zone_id: zone.zone_id,
                    name: zone.name,
                    price: zone.price,
                    capacity: zone.capacity,
                    numbered: zone.numbered,
                })
                .collect();
        }

        record
    }
}

/// Decode every base plan in the feed, in feed order.
///
/// # Errors
///
/// Returns a parse error when the document is not a decodable plan list.
pub fn parse_plan_list(xml: &str) -> Result<Vec<ProviderPlanRecord>, ProviderError> {
    let list: PlanListXml = quick_xml::de::from_str(xml).map_err(ProviderError::parse)?;

    Ok(list
        .output
        .unwrap_or_default()
        .base_plans
        .into_iter()
        .map(BasePlanXml::into_record)
        .collect())
}

/// Decode the feed and keep only plans sold online.
///
/// # Errors
///
/// Returns a parse error when the document is not a decodable plan list.
pub fn parse_online_plans(xml: &str) -> Result<Vec<ProviderPlanRecord>, ProviderError> {
    let plans = parse_plan_list(xml)?;
    let total = plans.len();
    let online: Vec<_> = plans
        .into_iter()
        .filter(ProviderPlanRecord::is_online)
        .collect();

    if online.len() < total {
        tracing::debug!(
            total,
            online = online.len(),
            "Discarded plans not sold online"
        );
    }

    Ok(online)
}
