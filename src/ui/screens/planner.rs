use crate::logic::IrrigationLedger;
use crate::models::{format_money, Eligibility, Zone, ZoneId};
use crate::ui::components::InputWidget;
use crate::ui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, StatefulWidget, Table, TableState, Widget},
};
use std::collections::HashSet;

const GEOMETRY_HINT: &str = "circle LAT,LON RADIUS_M  |  polygon LAT,LON; LAT,LON; LAT,LON";

pub struct PlannerScreen<'a> {
    pub ledger: &'a IrrigationLedger,
    pub plantation: &'a str,
    pub currency: &'a str,
    pub pending: &'a HashSet<ZoneId>,
    pub selected_index: usize,
    pub input: Option<&'a str>,
    pub status_message: Option<&'a str>,
    pub has_provider: bool,
}

impl<'a> PlannerScreen<'a> {
    pub fn new(
        ledger: &'a IrrigationLedger,
        plantation: &'a str,
        currency: &'a str,
        pending: &'a HashSet<ZoneId>,
    ) -> Self {
        Self {
            ledger,
            plantation,
            currency,
            pending,
            selected_index: 0,
            input: None,
            status_message: None,
            has_provider: true,
        }
    }

    pub fn with_selection(mut self, index: usize) -> Self {
        self.selected_index = index;
        self
    }

    pub fn editing(mut self, input: Option<&'a str>) -> Self {
        self.input = input;
        self
    }

    pub fn with_status(mut self, status: Option<&'a str>) -> Self {
        self.status_message = status;
        self
    }

    pub fn with_provider(mut self, has_provider: bool) -> Self {
        self.has_provider = has_provider;
        self
    }
}

impl Widget for PlannerScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let input_height = if self.input.is_some() { 3 } else { 0 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),            // Header
                Constraint::Min(6),               // Zone table
                Constraint::Length(input_height), // Geometry entry
                Constraint::Length(2),            // Totals
                Constraint::Length(1),            // Status message
                Constraint::Length(1),            // Nav bar
            ])
            .split(area);

        self.render_header(chunks[0], buf);
        self.render_table(chunks[1], buf);

        if let Some(value) = self.input {
            InputWidget::new("New zone (Enter to add, Esc to cancel)", value)
                .placeholder(GEOMETRY_HINT)
                .focused(true)
                .render(chunks[2], buf);
        }

        self.render_totals(chunks[3], buf);

        if let Some(msg) = self.status_message {
            Paragraph::new(Span::styled(msg, Theme::warning())).render(chunks[4], buf);
        }

        let nav = Line::from(vec![
            Span::styled("[↑↓]", Theme::nav_key()),
            Span::styled("Zone ", Theme::nav_label()),
            Span::styled("[Space]", Theme::nav_key()),
            Span::styled("Water ", Theme::nav_label()),
            Span::styled("[a]", Theme::nav_key()),
            Span::styled("Add ", Theme::nav_label()),
            Span::styled("[d]", Theme::nav_key()),
            Span::styled("Delete ", Theme::nav_label()),
            Span::styled("[←→]", Theme::nav_key()),
            Span::styled("Day ", Theme::nav_label()),
            Span::styled("[t]", Theme::nav_key()),
            Span::styled("Today ", Theme::nav_label()),
            Span::styled("[r]", Theme::nav_key()),
            Span::styled("Refresh ", Theme::nav_label()),
            Span::styled("[^S]", Theme::nav_key()),
            Span::styled("Save ", Theme::nav_label()),
            Span::styled("[e]", Theme::nav_key()),
            Span::styled("Export ", Theme::nav_label()),
            Span::styled("[w]", Theme::nav_key()),
            Span::styled("WhatsApp ", Theme::nav_label()),
            Span::styled("[q]", Theme::nav_key()),
            Span::styled("Quit", Theme::nav_label()),
        ]);
        Paragraph::new(nav).render(chunks[5], buf);
    }
}

impl PlannerScreen<'_> {
    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let date = self.ledger.date();
        let title = format!("palmwater - {}", self.plantation);

        let block = Block::default()
            .title(Span::styled(title, Theme::title()))
            .borders(Borders::BOTTOM)
            .border_style(Theme::border());

        let mut info = vec![
            Span::styled("Plan date: ", Theme::dim()),
            Span::styled(date.format("%a %d %b %Y").to_string(), Theme::highlight()),
            Span::styled(
                format!(
                    "  Rate: {}/m²",
                    format_money(self.currency, self.ledger.cost_per_square_meter())
                ),
                Theme::dim(),
            ),
        ];
        if self.ledger.is_dirty() {
            info.push(Span::styled("  [unsaved]", Theme::warning()));
        }
        if !self.has_provider {
            info.push(Span::styled("  [no forecast]", Theme::error()));
        }

        Paragraph::new(Line::from(info)).block(block).render(area, buf);
    }

    fn render_table(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled("Zones", Theme::header()))
            .borders(Borders::ALL)
            .border_style(Theme::border());

        if self.ledger.zones().is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            Paragraph::new(Span::styled(
                "No zones for this date. Press [a] to add one.",
                Theme::dim(),
            ))
            .render(inner, buf);
            return;
        }

        let header_cells = ["#", "Zone", "Type", "Area (m²)", "Forecast", "Watering", "Cost"]
            .iter()
            .map(|h| Cell::from(*h).style(Theme::header()));
        let header = Row::new(header_cells).height(1);

        let date = self.ledger.date();
        let rate = self.ledger.cost_per_square_meter();

        let rows: Vec<Row> = self
            .ledger
            .zones()
            .iter()
            .enumerate()
            .map(|(i, zone)| {
                let (forecast, color) = self.forecast_cell(zone, date);
                let watering = if zone.watering_enabled { "On" } else { "Off" };
                let cost = if zone.is_billable() {
                    format_money(self.currency, zone.billable_cost(rate))
                } else {
                    "-".to_string()
                };

                Row::new(vec![
                    Cell::from(format!("{}", i + 1)),
                    Cell::from(zone.label.as_str()).style(Style::default().fg(color)),
                    Cell::from(zone.kind().as_str()),
                    Cell::from(format!("{:.2}", zone.area_square_meters)),
                    Cell::from(forecast).style(Style::default().fg(color)),
                    Cell::from(watering),
                    Cell::from(cost),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(3),
            Constraint::Min(18),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(9),
            Constraint::Length(12),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Theme::selected());

        let mut state = TableState::default();
        state.select(Some(self.selected_index));
        StatefulWidget::render(table, area, buf, &mut state);
    }

    fn forecast_cell(&self, zone: &Zone, date: chrono::NaiveDate) -> (String, ratatui::style::Color) {
        if self.pending.contains(&zone.id) {
            return ("checking...".to_string(), Theme::PENDING);
        }

        let eligibility = zone.eligibility_on(date);
        let text = match (eligibility, &zone.forecast) {
            (Eligibility::RainBlocked, Some(f)) => {
                format!("Rain {:.0}%", f.verdict.probability * 100.0)
            }
            (Eligibility::Eligible, _) => "Dry".to_string(),
            // Last known state from the saved plan
            (_, _) if zone.rain_blocked => "Rain?".to_string(),
            _ => "?".to_string(),
        };
        (text, Theme::eligibility_color(eligibility))
    }

    fn render_totals(&self, area: Rect, buf: &mut Buffer) {
        let watered: Vec<&Zone> = self
            .ledger
            .zones()
            .iter()
            .filter(|z| z.is_billable())
            .collect();
        let watered_area: f64 = watered.iter().map(|z| z.area_square_meters).sum();

        let lines = vec![
            Line::from(vec![
                Span::styled("Watering: ", Theme::dim()),
                Span::styled(
                    format!("{} of {} zones", watered.len(), self.ledger.zones().len()),
                    Theme::normal(),
                ),
                Span::styled("  Area: ", Theme::dim()),
                Span::styled(format!("{:.2} m²", watered_area), Theme::normal()),
            ]),
            Line::from(vec![
                Span::styled("Total Cost: ", Theme::header()),
                Span::styled(
                    format_money(self.currency, self.ledger.total_cost()),
                    Theme::success(),
                ),
            ]),
        ];
        Paragraph::new(lines).render(area, buf);
    }
}
