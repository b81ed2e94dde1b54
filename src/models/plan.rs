use super::geometry::ShapeKind;
use super::zone::{Zone, ZoneId};
use chrono::NaiveDate;
use serde::Serialize;

/// All zones for one selected date.
#[derive(Debug, Clone)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub zones: Vec<Zone>,
}

impl DailyPlan {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            zones: Vec::new(),
        }
    }

    pub fn with_zones(date: NaiveDate, zones: Vec<Zone>) -> Self {
        Self { date, zones }
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }
}

/// Read-only view of a plan for receipts and messages
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub date: NaiveDate,
    pub plantation: String,
    pub currency: String,
    pub cost_per_square_meter: f64,
    pub zones: Vec<ZoneSummary>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSummary {
    pub label: String,
    pub kind: ShapeKind,
    pub area_square_meters: f64,
    pub cost: f64,
    pub rain_blocked: bool,
    pub watering_enabled: bool,
    pub billable: bool,
}

impl ZoneSummary {
    pub fn from_zone(zone: &Zone, cost_per_square_meter: f64) -> Self {
        Self {
            label: zone.label.clone(),
            kind: zone.kind(),
            area_square_meters: zone.area_square_meters,
            cost: zone.cost_for_date(cost_per_square_meter),
            rain_blocked: zone.rain_blocked,
            watering_enabled: zone.watering_enabled,
            billable: zone.is_billable(),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.rain_blocked {
            "Rain - no watering"
        } else if self.watering_enabled {
            "Watering"
        } else {
            "Not watered"
        }
    }
}

impl PlanSummary {
    pub fn billable_zones(&self) -> impl Iterator<Item = &ZoneSummary> {
        self.zones.iter().filter(|z| z.billable)
    }

    pub fn watered_area(&self) -> f64 {
        self.billable_zones().map(|z| z.area_square_meters).sum()
    }
}

/// Format an amount for display, e.g. `RM500.00`.
pub fn format_money(currency: &str, amount: f64) -> String {
    format!("{}{:.2}", currency, amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_uses_two_decimals() {
        assert_eq!(format_money("RM", 392.699), "RM392.70");
        assert_eq!(format_money("RM", 500.0), "RM500.00");
    }
}
