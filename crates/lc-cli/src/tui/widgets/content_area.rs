//! Scrollable transcript area.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Transcript display with scrolling support.
///
/// Lines arrive pre-rendered and pre-wrapped so the caller can measure
/// them for [`ScrollState`](crate::tui::scroll::ScrollState).
pub struct ContentArea<'a> {
    text: &'a Text<'static>,
    placeholder: &'a str,
    scroll_offset: u16,
    is_streaming: bool,
}

impl<'a> ContentArea<'a> {
    pub fn new(text: &'a Text<'static>, placeholder: &'a str) -> Self {
        Self {
            text,
            placeholder,
            scroll_offset: 0,
            is_streaming: false,
        }
    }

    pub fn scroll(mut self, offset: u16) -> Self {
        self.scroll_offset = offset;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.is_streaming = streaming;
        self
    }
}

/// Inner area of the transcript block.
pub fn content_inner(area: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(area)
}

impl Widget for ContentArea<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.is_streaming { " Chat... " } else { " Chat " };

        let block = Block::default()
            .title(Span::styled(title, Style::default().fg(Color::Cyan)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);

        if self.text.lines.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                self.placeholder,
                Style::default().fg(Color::DarkGray),
            )))
            .centered()
            .render(inner, buf);
            return;
        }

        let total_lines = self.text.lines.len() as u16;
        let max_scroll = total_lines.saturating_sub(inner.height);
        let effective_scroll = self.scroll_offset.min(max_scroll);

        Paragraph::new(self.text.clone())
            .scroll((effective_scroll, 0))
            .render(inner, buf);
    }
}
