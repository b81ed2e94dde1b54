use crate::logic::Receipt;
use crate::ui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

pub struct ReportScreen<'a> {
    pub receipt: &'a Receipt,
    pub whatsapp_link: Option<&'a str>,
    pub status_message: Option<&'a str>,
}

impl<'a> ReportScreen<'a> {
    pub fn new(receipt: &'a Receipt) -> Self {
        Self {
            receipt,
            whatsapp_link: None,
            status_message: None,
        }
    }

    pub fn with_link(mut self, link: Option<&'a str>) -> Self {
        self.whatsapp_link = link;
        self
    }

    pub fn with_status(mut self, status: Option<&'a str>) -> Self {
        self.status_message = status;
        self
    }
}

impl Widget for ReportScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let link_height = if self.whatsapp_link.is_some() { 6 } else { 0 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),              // Receipt
                Constraint::Length(link_height), // WhatsApp link
                Constraint::Length(1),           // Status
                Constraint::Length(1),           // Nav
            ])
            .split(area);

        let block = Block::default()
            .title(Span::styled("Receipt Preview", Theme::title()))
            .borders(Borders::ALL)
            .border_style(Theme::border());

        let lines: Vec<Line> = self
            .receipt
            .render_document()
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        Paragraph::new(lines).block(block).render(chunks[0], buf);

        if let Some(link) = self.whatsapp_link {
            let block = Block::default()
                .title("WhatsApp link (open in a browser)")
                .borders(Borders::ALL)
                .border_style(Theme::border_focused());
            Paragraph::new(Span::styled(link, Theme::highlight()))
                .wrap(Wrap { trim: false })
                .block(block)
                .render(chunks[1], buf);
        }

        if let Some(msg) = self.status_message {
            Paragraph::new(Span::styled(msg, Theme::warning())).render(chunks[2], buf);
        }

        let nav = Line::from(vec![
            Span::styled("[e]", Theme::nav_key()),
            Span::styled("Export ", Theme::nav_label()),
            Span::styled("[w]", Theme::nav_key()),
            Span::styled("WhatsApp ", Theme::nav_label()),
            Span::styled("[1-3]", Theme::nav_key()),
            Span::styled("Screens ", Theme::nav_label()),
            Span::styled("[Esc]", Theme::nav_key()),
            Span::styled("Back", Theme::nav_label()),
        ]);
        Paragraph::new(nav).render(chunks[3], buf);
    }
}
