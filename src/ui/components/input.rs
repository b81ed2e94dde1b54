use crate::ui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Single-line text entry with the cursor at the end
pub struct InputWidget<'a> {
    label: &'a str,
    value: &'a str,
    placeholder: Option<&'a str>,
    focused: bool,
}

impl<'a> InputWidget<'a> {
    pub fn new(label: &'a str, value: &'a str) -> Self {
        Self {
            label,
            value,
            placeholder: None,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Dim hint shown while the value is empty
    pub fn placeholder(mut self, placeholder: &'a str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }
}

impl Widget for InputWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            Theme::border_focused()
        } else {
            Theme::border()
        };

        let block = Block::default()
            .title(self.label)
            .borders(Borders::ALL)
            .border_style(border_style);

        let inner = block.inner(area);
        block.render(area, buf);

        let mut spans = Vec::with_capacity(3);
        if self.value.is_empty() {
            if let Some(hint) = self.placeholder {
                spans.push(Span::styled(hint, Theme::dim()));
            }
        } else {
            spans.push(Span::raw(self.value));
        }
        if self.focused {
            let cursor_at = if self.value.is_empty() { 0 } else { spans.len() };
            spans.insert(cursor_at, Span::styled(" ", Theme::selected()));
        }

        Paragraph::new(Line::from(spans)).render(inner, buf);
    }
}
