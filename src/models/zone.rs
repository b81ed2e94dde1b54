use super::forecast::RainVerdict;
use super::geometry::{Geometry, LatLng, ShapeKind};
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub Uuid);

impl ZoneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forecast fetched for this zone during the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneForecast {
    pub date: NaiveDate,
    pub verdict: RainVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// No forecast for the current date yet; shows last-known state
    Unverified,
    RainBlocked,
    Eligible,
}

impl Eligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Eligibility::Unverified => "Unverified",
            Eligibility::RainBlocked => "Rain",
            Eligibility::Eligible => "Dry",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub label: String,
    pub geometry: Geometry,
    pub area_square_meters: f64,
    pub rain_blocked: bool,
    pub watering_enabled: bool,
    pub forecast: Option<ZoneForecast>,
}

impl Zone {
    /// Validate the geometry and build a zone with watering off.
    pub fn new(label: impl Into<String>, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        let area_square_meters = geometry.area_square_meters();
        Ok(Self {
            id: ZoneId::new(),
            label: label.into(),
            geometry,
            area_square_meters,
            rain_blocked: false,
            watering_enabled: false,
            forecast: None,
        })
    }

    /// Rebuild a zone from stored state. Rain always wins over the stored toggle.
    pub fn restore(
        id: ZoneId,
        label: String,
        geometry: Geometry,
        rain_blocked: bool,
        watering_enabled: bool,
    ) -> Result<Self> {
        geometry.validate()?;
        let area_square_meters = geometry.area_square_meters();
        Ok(Self {
            id,
            label,
            geometry,
            area_square_meters,
            rain_blocked,
            watering_enabled: watering_enabled && !rain_blocked,
            forecast: None,
        })
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn centroid(&self) -> LatLng {
        self.geometry.centroid()
    }

    /// Area cost for the day, whether or not it is billed.
    pub fn cost_for_date(&self, cost_per_square_meter: f64) -> f64 {
        self.area_square_meters * cost_per_square_meter
    }

    pub fn is_billable(&self) -> bool {
        self.watering_enabled && !self.rain_blocked
    }

    pub fn billable_cost(&self, cost_per_square_meter: f64) -> f64 {
        if self.is_billable() {
            self.cost_for_date(cost_per_square_meter)
        } else {
            0.0
        }
    }

    pub fn eligibility_on(&self, date: NaiveDate) -> Eligibility {
        match &self.forecast {
            Some(f) if f.date == date => {
                if self.rain_blocked {
                    Eligibility::RainBlocked
                } else {
                    Eligibility::Eligible
                }
            }
            _ => Eligibility::Unverified,
        }
    }

    pub(crate) fn apply_verdict(&mut self, date: NaiveDate, verdict: RainVerdict) {
        self.rain_blocked = verdict.rain_expected;
        if self.rain_blocked {
            self.watering_enabled = false;
        }
        self.forecast = Some(ZoneForecast { date, verdict });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geometry::fixtures::equator_square;

    fn rain() -> RainVerdict {
        RainVerdict {
            rain_expected: true,
            probability: 0.9,
            precipitation_mm: 12.0,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn new_zone_starts_dry_and_off() {
        let zone = Zone::new("Plantation Area 1", equator_square(100.0)).unwrap();
        assert!(!zone.watering_enabled);
        assert!(!zone.rain_blocked);
        assert_eq!(zone.eligibility_on(day()), Eligibility::Unverified);
        assert_eq!(zone.billable_cost(0.05), 0.0);
    }

    #[test]
    fn rain_verdict_forces_watering_off() {
        let mut zone = Zone::new("Plantation Area 1", equator_square(100.0)).unwrap();
        zone.watering_enabled = true;
        zone.apply_verdict(day(), rain());
        assert!(zone.rain_blocked);
        assert!(!zone.watering_enabled);
        assert_eq!(zone.eligibility_on(day()), Eligibility::RainBlocked);
        assert_eq!(zone.eligibility_on(day().succ_opt().unwrap()), Eligibility::Unverified);
    }

    #[test]
    fn restore_never_keeps_watering_on_rain_blocked_zone() {
        let zone = Zone::restore(
            ZoneId::new(),
            "Plantation Area 2".into(),
            equator_square(50.0),
            true,
            true,
        )
        .unwrap();
        assert!(zone.rain_blocked);
        assert!(!zone.watering_enabled);
        assert!(zone.forecast.is_none());
    }
}
