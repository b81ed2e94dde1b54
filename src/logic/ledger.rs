use super::eligibility::{fetch_with_retry, ForecastProvider, RetryPolicy};
use crate::db::SnapshotStore;
use crate::error::{PlannerError, Result};
use crate::models::{DailyPlan, Geometry, PlanSummary, RainVerdict, Zone, ZoneId, ZoneSummary};
use chrono::NaiveDate;

const LABEL_PREFIX: &str = "Plantation Area ";

/// What happened to a forecast result handed to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastApplication {
    Updated,
    /// Requested for another date, or the zone is gone
    Stale,
}

/// Zone state, eligibility and cost for the selected date.
pub struct IrrigationLedger {
    plan: DailyPlan,
    cost_per_square_meter: f64,
    next_label: usize,
    dirty: bool,
}

impl IrrigationLedger {
    pub fn new(date: NaiveDate, cost_per_square_meter: f64) -> Self {
        Self {
            plan: DailyPlan::new(date),
            cost_per_square_meter,
            next_label: 1,
            dirty: false,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.plan.date
    }

    pub fn zones(&self) -> &[Zone] {
        &self.plan.zones
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.plan.zone(id)
    }

    pub fn cost_per_square_meter(&self) -> f64 {
        self.cost_per_square_meter
    }

    /// Changes since the last load or save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Validate and add a zone. Nothing changes if the geometry is rejected.
    pub fn add_zone(&mut self, geometry: Geometry) -> Result<&Zone> {
        let label = format!("{}{}", LABEL_PREFIX, self.next_label);
        let zone = Zone::new(label, geometry)?;

        tracing::info!(
            zone = %zone.label,
            kind = %zone.kind(),
            area_m2 = zone.area_square_meters,
            date = %self.plan.date,
            "Zone added"
        );

        self.next_label += 1;
        self.dirty = true;
        self.plan.zones.push(zone);
        Ok(&self.plan.zones[self.plan.zones.len() - 1])
    }

    pub fn remove_zone(&mut self, id: ZoneId) -> Result<Zone> {
        let index = self
            .plan
            .zones
            .iter()
            .position(|z| z.id == id)
            .ok_or_else(|| PlannerError::NotFound(format!("zone {}", id)))?;

        let zone = self.plan.zones.remove(index);
        self.dirty = true;
        tracing::info!(zone = %zone.label, date = %self.plan.date, "Zone removed");
        Ok(zone)
    }

    /// Apply a finished forecast lookup. Errors leave the zone untouched and
    /// are returned; results for another date or a removed zone are dropped.
    pub fn apply_forecast(
        &mut self,
        id: ZoneId,
        requested_for: NaiveDate,
        result: Result<RainVerdict>,
    ) -> Result<ForecastApplication> {
        if requested_for != self.plan.date {
            tracing::debug!(
                zone_id = %id,
                %requested_for,
                current = %self.plan.date,
                "Discarding forecast for superseded date"
            );
            return Ok(ForecastApplication::Stale);
        }

        let Some(zone) = self.plan.zone_mut(id) else {
            tracing::debug!(zone_id = %id, "Discarding forecast for removed zone");
            return Ok(ForecastApplication::Stale);
        };

        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    zone = %zone.label,
                    rain_blocked = zone.rain_blocked,
                    error = %e,
                    "Eligibility not verified, keeping last known state"
                );
                return Err(e);
            }
        };

        let was_blocked = zone.rain_blocked;
        let was_watering = zone.watering_enabled;
        zone.apply_verdict(requested_for, verdict);

        if zone.rain_blocked != was_blocked || zone.watering_enabled != was_watering {
            self.dirty = true;
        }
        tracing::debug!(
            zone = %zone.label,
            rain_blocked = zone.rain_blocked,
            probability = verdict.probability,
            precipitation_mm = verdict.precipitation_mm,
            "Eligibility updated"
        );
        Ok(ForecastApplication::Updated)
    }

    /// Look up the forecast at the zone's centroid for the plan date and apply it.
    pub async fn refresh_eligibility<P: ForecastProvider>(
        &mut self,
        id: ZoneId,
        provider: &P,
        retry: &RetryPolicy,
    ) -> Result<&Zone> {
        let date = self.plan.date;
        let at = self
            .zone(id)
            .map(|z| z.centroid())
            .ok_or_else(|| PlannerError::NotFound(format!("zone {}", id)))?;

        let result = fetch_with_retry(provider, at, date, retry).await;
        self.apply_forecast(id, date, result)?;

        self.zone(id)
            .ok_or_else(|| PlannerError::NotFound(format!("zone {}", id)))
    }

    /// Flip watering for an eligible zone and return the new value.
    pub fn toggle_watering(&mut self, id: ZoneId) -> Result<bool> {
        let zone = self
            .plan
            .zone_mut(id)
            .ok_or_else(|| PlannerError::NotFound(format!("zone {}", id)))?;

        if zone.rain_blocked {
            return Err(PlannerError::RainBlocked(zone.label.clone()));
        }

        zone.watering_enabled = !zone.watering_enabled;
        self.dirty = true;
        tracing::debug!(zone = %zone.label, watering = zone.watering_enabled, "Watering toggled");
        Ok(zone.watering_enabled)
    }

    pub fn total_cost(&self) -> f64 {
        self.plan
            .zones
            .iter()
            .map(|z| z.billable_cost(self.cost_per_square_meter))
            .sum()
    }

    /// Replace the zone set with the snapshot saved for `date`.
    /// On a store error the current plan is kept as is.
    pub fn select_date<S: SnapshotStore + ?Sized>(&mut self, date: NaiveDate, store: &S) -> Result<()> {
        let zones = store.load_snapshot(date)?;

        tracing::info!(%date, zones = zones.len(), "Plan loaded");
        self.next_label = next_label_after(&zones);
        self.plan = DailyPlan::with_zones(date, zones);
        self.dirty = false;
        Ok(())
    }

    pub fn save<S: SnapshotStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        store.save_snapshot(self.plan.date, &self.plan.zones)?;
        self.dirty = false;
        tracing::info!(date = %self.plan.date, zones = self.plan.zones.len(), "Plan saved");
        Ok(())
    }

    pub fn summary(&self, plantation: &str, currency: &str) -> PlanSummary {
        PlanSummary {
            date: self.plan.date,
            plantation: plantation.to_string(),
            currency: currency.to_string(),
            cost_per_square_meter: self.cost_per_square_meter,
            zones: self
                .plan
                .zones
                .iter()
                .map(|z| ZoneSummary::from_zone(z, self.cost_per_square_meter))
                .collect(),
            total: self.total_cost(),
        }
    }
}

/// Continue numbering after the highest "Plantation Area N" already present.
fn next_label_after(zones: &[Zone]) -> usize {
    zones
        .iter()
        .filter_map(|z| z.label.strip_prefix(LABEL_PREFIX)?.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        .max(zones.len())
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::logic::eligibility::fakes::FakeForecast;
    use crate::logic::EligibilityRefresher;
    use crate::models::geometry::fixtures::equator_square;
    use crate::models::{Eligibility, LatLng};
    use std::cell::Cell;
    use std::time::Duration;

    const RATE: f64 = 0.05;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    fn hectare() -> Geometry {
        equator_square(100.0)
    }

    fn assert_rain_invariant(ledger: &IrrigationLedger) {
        for zone in ledger.zones() {
            assert!(
                !(zone.rain_blocked && zone.watering_enabled),
                "{} is rain blocked but still watering",
                zone.label
            );
        }
    }

    /// Store whose reads and writes can be made to fail
    struct FlakyStore {
        inner: Database,
        fail: Cell<bool>,
    }

    impl SnapshotStore for FlakyStore {
        fn save_snapshot(&self, date: NaiveDate, zones: &[Zone]) -> Result<()> {
            if self.fail.get() {
                return Err(PlannerError::Persistence(rusqlite::Error::InvalidQuery));
            }
            self.inner.save_snapshot(date, zones)
        }

        fn load_snapshot(&self, date: NaiveDate) -> Result<Vec<Zone>> {
            if self.fail.get() {
                return Err(PlannerError::Persistence(rusqlite::Error::InvalidQuery));
            }
            self.inner.load_snapshot(date)
        }
    }

    #[test]
    fn add_zone_labels_and_computes_area() {
        let mut ledger = IrrigationLedger::new(day(16), RATE);

        let first = ledger.add_zone(hectare()).unwrap();
        assert_eq!(first.label, "Plantation Area 1");
        assert!((first.area_square_meters - 10_000.0).abs() < 0.01);
        assert!(!first.watering_enabled);
        assert!(!first.rain_blocked);
        assert!(first.forecast.is_none());

        let second = ledger
            .add_zone(Geometry::circle(LatLng::new(3.5609, 101.6585), 50.0))
            .unwrap();
        assert_eq!(second.label, "Plantation Area 2");
        assert!((second.area_square_meters - 7853.98).abs() < 0.01);
        assert!(ledger.is_dirty());
    }

    #[test]
    fn rejected_geometry_leaves_ledger_unchanged() {
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        ledger.add_zone(hectare()).unwrap();

        let line = Geometry::polygon(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 0.001),
            LatLng::new(0.0, 0.002),
        ]);
        let err = ledger.add_zone(line).unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
        assert_eq!(ledger.zones().len(), 1);

        // Numbering is not consumed by a failed add
        let next = ledger.add_zone(hectare()).unwrap();
        assert_eq!(next.label, "Plantation Area 2");
    }

    #[test]
    fn hectare_costs_exactly_five_hundred() {
        let mut ledger = IrrigationLedger::new(day(16), RATE);

        // Exact area so the cost comparison is exact too
        let mut zone = Zone::new("Plantation Area 1", hectare()).unwrap();
        zone.area_square_meters = 10_000.0;
        let id = zone.id;
        ledger.plan.zones.push(zone);

        assert_eq!(ledger.total_cost(), 0.0);
        assert!(ledger.toggle_watering(id).unwrap());
        assert_eq!(ledger.total_cost(), 500.0);
        assert!(!ledger.toggle_watering(id).unwrap());
        assert_eq!(ledger.total_cost(), 0.0);
        assert!(ledger.toggle_watering(id).unwrap());
        assert_eq!(ledger.total_cost(), 500.0);
    }

    #[test]
    fn circle_cost_matches_pi_r_squared() {
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger
            .add_zone(Geometry::circle(LatLng::new(3.5609, 101.6585), 50.0))
            .unwrap()
            .id;
        ledger.toggle_watering(id).unwrap();
        assert!((ledger.total_cost() - 392.70).abs() < 0.005);
    }

    #[tokio::test]
    async fn rain_forces_watering_off_and_excludes_cost() {
        let provider = FakeForecast::new().with(day(16), RainVerdict::rain(0.8, 6.0));
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;

        ledger.toggle_watering(id).unwrap();
        assert!(ledger.total_cost() > 0.0);

        let zone = ledger
            .refresh_eligibility(id, &provider, &no_wait())
            .await
            .unwrap();
        assert!(zone.rain_blocked);
        assert!(!zone.watering_enabled);
        assert_eq!(zone.eligibility_on(day(16)), Eligibility::RainBlocked);
        assert_eq!(ledger.total_cost(), 0.0);
        assert_rain_invariant(&ledger);
    }

    #[tokio::test]
    async fn toggle_is_rejected_for_rain_blocked_zone() {
        let provider = FakeForecast::new().with(day(16), RainVerdict::rain(0.8, 6.0));
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;
        ledger
            .refresh_eligibility(id, &provider, &no_wait())
            .await
            .unwrap();

        let err = ledger.toggle_watering(id).unwrap_err();
        assert!(matches!(err, PlannerError::RainBlocked(label) if label == "Plantation Area 1"));
        assert!(!ledger.zone(id).unwrap().watering_enabled);
    }

    #[tokio::test]
    async fn adding_rain_blocked_zone_does_not_change_total() {
        let provider = FakeForecast::new().with(day(16), RainVerdict::rain(0.9, 3.0));
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let dry = ledger
            .add_zone(Geometry::circle(LatLng::new(3.5, 101.6), 30.0))
            .unwrap()
            .id;
        ledger.toggle_watering(dry).unwrap();
        let before = ledger.total_cost();

        let wet = ledger.add_zone(hectare()).unwrap().id;
        ledger
            .refresh_eligibility(wet, &provider, &no_wait())
            .await
            .unwrap();

        assert_eq!(ledger.total_cost(), before);
    }

    #[tokio::test]
    async fn refresh_is_idempotent_for_unchanged_forecast() {
        let provider = FakeForecast::new().with(day(16), RainVerdict::dry());
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;

        let first = ledger
            .refresh_eligibility(id, &provider, &no_wait())
            .await
            .unwrap()
            .rain_blocked;
        let second = ledger
            .refresh_eligibility(id, &provider, &no_wait())
            .await
            .unwrap()
            .rain_blocked;
        assert_eq!(first, second);
        assert!(!second);
        assert_eq!(
            ledger.zone(id).unwrap().eligibility_on(day(16)),
            Eligibility::Eligible
        );
    }

    #[tokio::test]
    async fn forecast_failure_keeps_last_known_state() {
        let provider = FakeForecast::new().with(day(16), RainVerdict::rain(0.7, 2.0));
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;
        ledger
            .refresh_eligibility(id, &provider, &no_wait())
            .await
            .unwrap();

        let failing = FakeForecast::new().failing_first(10);
        let err = ledger
            .refresh_eligibility(id, &failing, &no_wait())
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::ForecastUnavailable(_)));
        assert!(ledger.zone(id).unwrap().rain_blocked);
    }

    #[test]
    fn stale_forecast_results_are_discarded() {
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;

        let applied = ledger
            .apply_forecast(id, day(15), Ok(RainVerdict::rain(1.0, 20.0)))
            .unwrap();
        assert_eq!(applied, ForecastApplication::Stale);
        assert!(!ledger.zone(id).unwrap().rain_blocked);

        // Errors for a superseded date are dropped too
        let applied = ledger
            .apply_forecast(
                id,
                day(15),
                Err(PlannerError::ForecastUnavailable("timeout".into())),
            )
            .unwrap();
        assert_eq!(applied, ForecastApplication::Stale);

        let applied = ledger
            .apply_forecast(ZoneId::new(), day(16), Ok(RainVerdict::dry()))
            .unwrap();
        assert_eq!(applied, ForecastApplication::Stale);
    }

    /// Ledger on the 16th with one zone that is also planned on the 17th,
    /// and a refresher whose lookups for the 16th report rain after a delay.
    fn ledger_with_late_rain(
        db: &Database,
    ) -> (IrrigationLedger, EligibilityRefresher<FakeForecast>, ZoneId) {
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;
        ledger.toggle_watering(id).unwrap();
        ledger.save(db).unwrap();
        db.save_snapshot(day(17), ledger.zones()).unwrap();

        let provider = FakeForecast::new()
            .with(day(16), RainVerdict::rain(1.0, 20.0))
            .delayed(Duration::from_millis(20));
        (ledger, EligibilityRefresher::new(provider, no_wait()), id)
    }

    #[tokio::test]
    async fn late_result_for_previous_date_is_discarded() {
        let db = Database::open_in_memory().unwrap();
        let (mut ledger, mut refresher, id) = ledger_with_late_rain(&db);

        refresher.request(ledger.zone(id).unwrap(), day(16));
        ledger.select_date(day(17), &db).unwrap();

        let outcome = refresher.next().await.unwrap();
        assert_eq!(outcome.date, day(16));
        let applied = ledger
            .apply_forecast(outcome.zone_id, outcome.date, outcome.result)
            .unwrap();

        assert_eq!(applied, ForecastApplication::Stale);
        let zone = ledger.zone(id).unwrap();
        assert!(!zone.rain_blocked);
        assert!(zone.watering_enabled);
        assert!(zone.forecast.is_none());
        assert!(!ledger.is_dirty());
        assert!((ledger.total_cost() - 500.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn date_switch_with_cancel_leaves_nothing_to_apply() {
        let db = Database::open_in_memory().unwrap();
        let (mut ledger, mut refresher, id) = ledger_with_late_rain(&db);

        refresher.request(ledger.zone(id).unwrap(), day(16));
        refresher.cancel_all();
        ledger.select_date(day(17), &db).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(refresher.next().await.is_none());
        assert!(!ledger.zone(id).unwrap().rain_blocked);
        assert!(ledger.zone(id).unwrap().watering_enabled);
    }

    #[test]
    fn save_and_reload_restores_zones_and_cost() {
        let db = Database::open_in_memory().unwrap();
        let mut ledger = IrrigationLedger::new(day(16), RATE);

        let square = ledger.add_zone(hectare()).unwrap().id;
        ledger
            .add_zone(Geometry::circle(LatLng::new(3.5609, 101.6585), 50.0))
            .unwrap();
        ledger.toggle_watering(square).unwrap();

        let geometries: Vec<Geometry> = ledger.zones().iter().map(|z| z.geometry.clone()).collect();
        let watering: Vec<bool> = ledger.zones().iter().map(|z| z.watering_enabled).collect();
        let cost = ledger.total_cost();

        ledger.save(&db).unwrap();
        assert!(!ledger.is_dirty());

        ledger.select_date(day(17), &db).unwrap();
        assert!(ledger.zones().is_empty());
        assert_eq!(ledger.total_cost(), 0.0);

        ledger.select_date(day(16), &db).unwrap();
        let reloaded: Vec<Geometry> = ledger.zones().iter().map(|z| z.geometry.clone()).collect();
        let reloaded_watering: Vec<bool> = ledger.zones().iter().map(|z| z.watering_enabled).collect();
        assert_eq!(reloaded, geometries);
        assert_eq!(reloaded_watering, watering);
        assert_eq!(ledger.total_cost(), cost);
        assert!(ledger.zones().iter().all(|z| z.forecast.is_none()));

        let next = ledger.add_zone(hectare()).unwrap();
        assert_eq!(next.label, "Plantation Area 3");
    }

    #[test]
    fn store_failure_on_select_date_keeps_current_plan() {
        let store = FlakyStore {
            inner: Database::open_in_memory().unwrap(),
            fail: Cell::new(false),
        };
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        ledger.add_zone(hectare()).unwrap();

        store.fail.set(true);
        let err = ledger.select_date(day(17), &store).unwrap_err();
        assert!(matches!(err, PlannerError::Persistence(_)));
        assert_eq!(ledger.date(), day(16));
        assert_eq!(ledger.zones().len(), 1);

        assert!(ledger.save(&store).is_err());
        assert!(ledger.is_dirty());
    }

    #[tokio::test]
    async fn date_switch_invalidates_cached_forecasts() {
        let db = Database::open_in_memory().unwrap();
        let provider = FakeForecast::new().with(day(16), RainVerdict::dry());
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;
        ledger
            .refresh_eligibility(id, &provider, &no_wait())
            .await
            .unwrap();
        ledger.save(&db).unwrap();

        ledger.select_date(day(16), &db).unwrap();
        assert_eq!(
            ledger.zone(id).unwrap().eligibility_on(day(16)),
            Eligibility::Unverified
        );
    }

    #[test]
    fn remove_zone_drops_its_cost() {
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let id = ledger.add_zone(hectare()).unwrap().id;
        ledger.toggle_watering(id).unwrap();

        let removed = ledger.remove_zone(id).unwrap();
        assert_eq!(removed.label, "Plantation Area 1");
        assert_eq!(ledger.total_cost(), 0.0);
        assert!(matches!(
            ledger.remove_zone(id),
            Err(PlannerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn summary_lists_every_zone_and_bills_only_eligible() {
        let provider = FakeForecast::new().with(day(16), RainVerdict::rain(0.9, 4.0));
        let mut ledger = IrrigationLedger::new(day(16), RATE);
        let dry = ledger.add_zone(hectare()).unwrap().id;
        let wet = ledger
            .add_zone(Geometry::circle(LatLng::new(3.5, 101.6), 50.0))
            .unwrap()
            .id;
        ledger.toggle_watering(dry).unwrap();
        ledger
            .refresh_eligibility(wet, &provider, &no_wait())
            .await
            .unwrap();

        let summary = ledger.summary("Sungai Buloh Estate", "RM");
        assert_eq!(summary.zones.len(), 2);
        assert!(summary.zones[0].billable);
        assert!(!summary.zones[1].billable);
        assert_eq!(summary.zones[1].status(), "Rain - no watering");
        assert_eq!(summary.total, ledger.total_cost());
        assert!((summary.watered_area() - ledger.zone(dry).unwrap().area_square_meters).abs() < 1e-9);
    }

    #[test]
    fn labels_continue_after_highest_number() {
        let zones = vec![
            Zone::new("Plantation Area 4", hectare()).unwrap(),
            Zone::new("North block", hectare()).unwrap(),
        ];
        assert_eq!(next_label_after(&zones), 5);
        assert_eq!(next_label_after(&[]), 1);
    }
}
