use crate::models::{DailyForecast, RainThresholds};
use crate::ui::Theme;
use chrono::{DateTime, Local, NaiveDate};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

pub struct OutlookScreen<'a> {
    pub days: &'a [DailyForecast],
    pub thresholds: RainThresholds,
    pub plan_date: NaiveDate,
    pub updated: Option<DateTime<Local>>,
    pub status_message: Option<&'a str>,
}

impl<'a> OutlookScreen<'a> {
    pub fn new(days: &'a [DailyForecast], thresholds: RainThresholds, plan_date: NaiveDate) -> Self {
        Self {
            days,
            thresholds,
            plan_date,
            updated: None,
            status_message: None,
        }
    }

    pub fn updated_at(mut self, updated: Option<DateTime<Local>>) -> Self {
        self.updated = updated;
        self
    }

    pub fn with_status(mut self, status: Option<&'a str>) -> Self {
        self.status_message = status;
        self
    }
}

impl Widget for OutlookScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Title
                Constraint::Min(6),    // Outlook table
                Constraint::Length(1), // Status
                Constraint::Length(1), // Nav
            ])
            .split(area);

        let updated = self
            .updated
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string());

        let title = Line::from(vec![
            Span::styled("Plantation Outlook", Theme::title()),
            Span::styled(" - Last updated: ", Theme::dim()),
            Span::styled(updated, Theme::normal()),
        ]);
        Paragraph::new(title).render(chunks[0], buf);

        self.render_table(chunks[1], buf);

        if let Some(msg) = self.status_message {
            Paragraph::new(Span::styled(msg, Theme::warning())).render(chunks[2], buf);
        }

        let nav = Line::from(vec![
            Span::styled("[r]", Theme::nav_key()),
            Span::styled("Refresh ", Theme::nav_label()),
            Span::styled("[1-3]", Theme::nav_key()),
            Span::styled("Screens ", Theme::nav_label()),
            Span::styled("[Esc]", Theme::nav_key()),
            Span::styled("Back", Theme::nav_label()),
        ]);
        Paragraph::new(nav).render(chunks[3], buf);
    }
}

impl OutlookScreen<'_> {
    fn render_table(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title("Daily Forecast")
            .borders(Borders::ALL)
            .border_style(Theme::border());

        let inner = block.inner(area);
        block.render(area, buf);

        if self.days.is_empty() {
            Paragraph::new(Span::styled("No forecast loaded", Theme::dim())).render(inner, buf);
            return;
        }

        let header = Row::new(vec![
            Cell::from("Day"),
            Cell::from("Date"),
            Cell::from("Weather"),
            Cell::from("Rain chance"),
            Cell::from("Rain (mm)"),
            Cell::from("High/Low"),
            Cell::from("Humidity"),
            Cell::from("Watering"),
        ])
        .style(Theme::header());

        let rows: Vec<Row> = self
            .days
            .iter()
            .map(|day| {
                let verdict = day.rain_verdict(&self.thresholds);
                let (watering, watering_color) = if verdict.rain_expected {
                    ("Blocked", Theme::RAIN)
                } else {
                    ("OK", Theme::DRY)
                };

                let date_style = if day.date == self.plan_date {
                    Theme::highlight()
                } else {
                    Theme::normal()
                };

                Row::new(vec![
                    Cell::from(day.date.format("%a").to_string()).style(date_style),
                    Cell::from(day.date.format("%d %b").to_string()).style(date_style),
                    Cell::from(format!(
                        "{} {}",
                        day.dominant_condition.symbol(),
                        day.dominant_condition
                    )),
                    Cell::from(format!("{:.0}%", day.max_precipitation_prob * 100.0)).style(
                        Style::default().fg(Theme::rain_chance_color(day.max_precipitation_prob)),
                    ),
                    Cell::from(format!("{:.1}", day.total_precipitation_mm)),
                    Cell::from(Line::from(vec![
                        Span::styled(
                            format!("{:.0}°", day.high_temp_c),
                            Style::default().fg(Theme::temp_color(day.high_temp_c)),
                        ),
                        Span::styled("/", Theme::dim()),
                        Span::styled(
                            format!("{:.0}°C", day.low_temp_c),
                            Style::default().fg(Theme::temp_color(day.low_temp_c)),
                        ),
                    ])),
                    Cell::from(format!("{:.0}%", day.avg_humidity)),
                    Cell::from(watering).style(Style::default().fg(watering_color)),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(10),
        ];

        Table::new(rows, widths).header(header).render(inner, buf);
    }
}
