use crate::config::Config;
use crate::datasources::OpenWeatherMapClient;
use crate::db::Database;
use crate::error::{PlannerError, Result};
use crate::logic::{EligibilityRefresher, IrrigationLedger, Receipt};
use crate::models::{format_money, DailyForecast, Geometry, PlanSummary, ZoneId};
use chrono::{DateTime, Days, Local, NaiveDate};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Planner,
    Outlook,
    Report,
}

impl Screen {
    pub fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Screen::Planner),
            '2' => Some(Screen::Outlook),
            '3' => Some(Screen::Report),
            _ => None,
        }
    }
}

pub struct PlannerState {
    pub selected_index: usize,
    pub editing: bool,
    pub edit_buffer: String,
}

impl PlannerState {
    pub fn new() -> Self {
        Self {
            selected_index: 0,
            editing: false,
            edit_buffer: String::new(),
        }
    }

    pub fn next(&mut self, max: usize) {
        if max > 0 && self.selected_index < max - 1 {
            self.selected_index += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    /// Keep the selection inside a list that may have shrunk
    pub fn clamp(&mut self, len: usize) {
        self.selected_index = self.selected_index.min(len.saturating_sub(1));
    }

    pub fn start_editing(&mut self) {
        self.editing = true;
        self.edit_buffer.clear();
    }

    pub fn cancel_editing(&mut self) {
        self.editing = false;
        self.edit_buffer.clear();
    }

    pub fn finish_editing(&mut self) -> String {
        self.editing = false;
        std::mem::take(&mut self.edit_buffer)
    }
}

pub struct App {
    pub screen: Screen,
    pub should_quit: bool,
    pub config: Config,
    pub db: Database,
    data_dir: Option<PathBuf>,

    // Plan state
    pub ledger: IrrigationLedger,
    refresher: Option<EligibilityRefresher<OpenWeatherMapClient>>,
    pub pending_zones: HashSet<ZoneId>,

    // Outlook
    pub outlook: Vec<DailyForecast>,
    pub outlook_updated: Option<DateTime<Local>>,

    // Screen states
    pub planner_state: PlannerState,

    // UI state
    pub status_message: Option<String>,
    pub whatsapp_link: Option<String>,
    pub needs_outlook_refresh: bool,
}

impl App {
    pub fn new(
        config: Config,
        db: Database,
        data_dir: Option<PathBuf>,
        refresher: Option<EligibilityRefresher<OpenWeatherMapClient>>,
    ) -> Result<Self> {
        let today = Local::now().date_naive();
        let mut ledger = IrrigationLedger::new(today, config.plantation.cost_per_square_meter);
        ledger.select_date(today, &db)?;

        let mut app = Self {
            screen: Screen::Planner,
            should_quit: false,
            config,
            db,
            data_dir,
            ledger,
            refresher,
            pending_zones: HashSet::new(),
            outlook: Vec::new(),
            outlook_updated: None,
            planner_state: PlannerState::new(),
            status_message: None,
            whatsapp_link: None,
            needs_outlook_refresh: false,
        };
        app.refresh_all();
        Ok(app)
    }

    pub fn switch_screen(&mut self, screen: Screen) {
        self.screen = screen;
        if screen == Screen::Outlook && self.outlook.is_empty() {
            self.request_outlook_refresh();
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn set_status(&mut self, message: &str) {
        self.status_message = Some(message.to_string());
    }

    pub fn has_forecast_provider(&self) -> bool {
        self.refresher.is_some()
    }

    pub fn selected_zone_id(&self) -> Option<ZoneId> {
        self.ledger
            .zones()
            .get(self.planner_state.selected_index)
            .map(|z| z.id)
    }

    pub fn summary(&self) -> PlanSummary {
        self.ledger
            .summary(&self.config.plantation.name, &self.config.plantation.currency)
    }

    pub fn receipt(&self) -> Receipt {
        Receipt::from_summary(self.summary(), self.config.plantation.operator.clone())
    }

    pub fn total_display(&self) -> String {
        format_money(&self.config.plantation.currency, self.ledger.total_cost())
    }

    /// Start eligibility lookups for every zone of the current date
    pub fn refresh_all(&mut self) {
        let date = self.ledger.date();
        let Some(refresher) = self.refresher.as_mut() else {
            if !self.ledger.zones().is_empty() {
                self.set_status("No forecast provider configured - eligibility unverified");
            }
            return;
        };

        refresher.request_all(self.ledger.zones(), date);
        self.pending_zones
            .extend(self.ledger.zones().iter().map(|z| z.id));

        let count = self.ledger.zones().len();
        if count > 0 {
            self.set_status(&format!("Checking forecast for {} zone(s)...", count));
        }
    }

    fn refresh_zone(&mut self, id: ZoneId) {
        let date = self.ledger.date();
        if let (Some(refresher), Some(zone)) = (self.refresher.as_mut(), self.ledger.zone(id)) {
            refresher.request(zone, date);
            self.pending_zones.insert(id);
        }
    }

    /// Apply finished forecast lookups. Called once per UI tick.
    pub fn poll_forecasts(&mut self) {
        let Some(refresher) = self.refresher.as_mut() else {
            return;
        };

        while let Some(outcome) = refresher.try_next() {
            if outcome.date == self.ledger.date() {
                self.pending_zones.remove(&outcome.zone_id);
            }

            if let Err(e) = self
                .ledger
                .apply_forecast(outcome.zone_id, outcome.date, outcome.result)
            {
                let label = self
                    .ledger
                    .zone(outcome.zone_id)
                    .map(|z| z.label.clone())
                    .unwrap_or_default();
                self.status_message = Some(format!("{}: {}", label, e));
                continue;
            }

            let in_progress = self
                .status_message
                .as_deref()
                .is_some_and(|s| s.starts_with("Checking forecast"));
            if self.pending_zones.is_empty() && in_progress {
                self.status_message = Some("Forecast checked".to_string());
            }
        }
    }

    pub fn add_zone_from_input(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }

        let added = Geometry::parse(input).and_then(|geometry| {
            self.ledger
                .add_zone(geometry)
                .map(|z| (z.id, z.label.clone(), z.area_square_meters))
        });

        match added {
            Ok((id, label, area)) => {
                self.planner_state.selected_index = self.ledger.zones().len() - 1;
                self.set_status(&format!("{} added ({:.2} m²)", label, area));
                self.refresh_zone(id);
            }
            Err(e) => self.set_status(&e.to_string()),
        }
    }

    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected_zone_id() else {
            return;
        };
        match self.ledger.remove_zone(id) {
            Ok(zone) => {
                self.pending_zones.remove(&id);
                self.planner_state.clamp(self.ledger.zones().len());
                self.set_status(&format!("{} removed", zone.label));
            }
            Err(e) => self.set_status(&e.to_string()),
        }
    }

    pub fn toggle_selected(&mut self) {
        let Some(id) = self.selected_zone_id() else {
            return;
        };
        match self.ledger.toggle_watering(id) {
            Ok(true) => {
                let total = self.total_display();
                self.set_status(&format!("Watering on - total {}", total));
            }
            Ok(false) => {
                let total = self.total_display();
                self.set_status(&format!("Watering off - total {}", total));
            }
            Err(e @ PlannerError::RainBlocked(_)) => self.set_status(&e.to_string()),
            Err(e) => self.set_status(&format!("Toggle failed: {}", e)),
        }
    }

    pub fn shift_date(&mut self, days: i64) {
        let current = self.ledger.date();
        let target = if days >= 0 {
            current.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            current.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        if let Some(date) = target {
            self.select_date(date);
        }
    }

    pub fn go_today(&mut self) {
        self.select_date(Local::now().date_naive());
    }

    /// Switch plans. Unsaved changes are saved first.
    pub fn select_date(&mut self, date: NaiveDate) {
        if date == self.ledger.date() {
            return;
        }

        if self.ledger.is_dirty() {
            if let Err(e) = self.ledger.save(&self.db) {
                self.set_status(&format!("Save failed, staying on {}: {}", self.ledger.date(), e));
                return;
            }
        }

        if let Some(refresher) = self.refresher.as_mut() {
            refresher.cancel_all();
        }
        self.pending_zones.clear();

        match self.ledger.select_date(date, &self.db) {
            Ok(()) => {
                self.planner_state.clamp(self.ledger.zones().len());
                self.whatsapp_link = None;
                self.set_status(&format!("Plan for {}", date.format("%a %d %b %Y")));
                self.refresh_all();
            }
            Err(e) => self.set_status(&format!("Could not load {}: {}", date, e)),
        }
    }

    pub fn save(&mut self) {
        match self.ledger.save(&self.db) {
            Ok(()) => {
                let date = self.ledger.date();
                self.set_status(&format!("Plan for {} saved", date));
            }
            Err(e) => self.set_status(&format!("Save failed: {}", e)),
        }
    }

    pub fn export_receipt(&mut self) {
        let result = self
            .config
            .receipts_dir(self.data_dir.as_ref())
            .and_then(|dir| self.receipt().write_to(&dir));

        match result {
            Ok(path) => self.set_status(&format!("Receipt written to {}", path.display())),
            Err(e) => self.set_status(&format!("Export failed: {}", e)),
        }
    }

    pub fn build_whatsapp_link(&mut self) {
        let Some(phone) = self.config.export.whatsapp_phone.clone() else {
            self.set_status("Set export.whatsapp_phone in config to send to the admin");
            return;
        };

        match self.receipt().whatsapp_link(&phone) {
            Ok(link) => {
                self.whatsapp_link = Some(link);
                self.screen = Screen::Report;
                self.set_status("WhatsApp link ready on the Report screen");
            }
            Err(e) => self.set_status(&e.to_string()),
        }
    }

    pub fn request_outlook_refresh(&mut self) {
        if self.refresher.is_none() {
            self.set_status("No forecast provider configured");
            return;
        }
        self.needs_outlook_refresh = true;
        self.set_status("Fetching outlook...");
    }

    pub async fn refresh_outlook(&mut self) {
        self.needs_outlook_refresh = false;
        let Some(refresher) = self.refresher.as_ref() else {
            return;
        };

        let center = self.config.plantation_center();
        let days = self.config.forecast.outlook_days;
        let today = Local::now().date_naive();

        let result = refresher.provider().daily_outlook(center, today, days).await;
        match result {
            Ok(outlook) => {
                self.outlook = outlook;
                self.outlook_updated = Some(Local::now());
                self.set_status("Outlook updated");
            }
            Err(e) => self.set_status(&format!("Outlook failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SnapshotStore;

    fn app() -> App {
        App::new(Config::default(), Database::open_in_memory().unwrap(), None, None).unwrap()
    }

    #[test]
    fn adding_from_input_selects_new_zone() {
        let mut app = app();
        app.add_zone_from_input("circle 3.5609,101.6585 50");
        app.add_zone_from_input("polygon 3.56,101.65; 3.561,101.65; 3.561,101.651");

        assert_eq!(app.ledger.zones().len(), 2);
        assert_eq!(app.planner_state.selected_index, 1);
        assert!(app.pending_zones.is_empty());
    }

    #[test]
    fn bad_input_reports_and_adds_nothing() {
        let mut app = app();
        app.add_zone_from_input("circle 3.5,101.6 -5");

        assert!(app.ledger.zones().is_empty());
        assert!(app
            .status_message
            .as_deref()
            .is_some_and(|s| s.contains("radius")));
    }

    #[test]
    fn toggle_updates_total() {
        let mut app = app();
        app.add_zone_from_input("circle 3.5609,101.6585 50");
        app.toggle_selected();

        assert_eq!(app.total_display(), "RM392.70");
    }

    #[test]
    fn switching_date_saves_unsaved_changes() {
        let mut app = app();
        let today = app.ledger.date();
        app.add_zone_from_input("circle 3.5609,101.6585 50");

        app.shift_date(1);
        assert!(app.ledger.zones().is_empty());
        assert_eq!(app.db.load_snapshot(today).unwrap().len(), 1);

        app.shift_date(-1);
        assert_eq!(app.ledger.zones().len(), 1);
        assert_eq!(app.ledger.date(), today);
    }

    #[test]
    fn delete_keeps_selection_in_range() {
        let mut app = app();
        app.add_zone_from_input("circle 3.5609,101.6585 50");
        app.add_zone_from_input("circle 3.57,101.66 20");
        app.delete_selected();

        assert_eq!(app.ledger.zones().len(), 1);
        assert_eq!(app.planner_state.selected_index, 0);
    }

    #[test]
    fn whatsapp_needs_configured_phone() {
        let mut app = app();
        app.build_whatsapp_link();
        assert!(app.whatsapp_link.is_none());

        app.config.export.whatsapp_phone = Some("60123456789".into());
        app.build_whatsapp_link();
        assert!(app
            .whatsapp_link
            .as_deref()
            .is_some_and(|l| l.starts_with("https://wa.me/60123456789?text=")));
        assert_eq!(app.screen, Screen::Report);
    }
}
