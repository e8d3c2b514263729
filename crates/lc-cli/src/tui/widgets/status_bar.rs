//! Header bar showing the selected model and turn status.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Status bar display state
pub struct StatusBar<'a> {
    title: &'a str,
    model_label: &'a str,
    position: Option<(usize, usize)>,
    is_loading: bool,
    is_streaming: bool,
    status_message: Option<&'a str>,
}

impl<'a> StatusBar<'a> {
    pub fn new(title: &'a str, model_label: &'a str) -> Self {
        Self {
            title,
            model_label,
            position: None,
            is_loading: false,
            is_streaming: false,
            status_message: None,
        }
    }

    /// Index (0-based) of the selected model among `count`.
    pub fn position(mut self, selected: usize, count: usize) -> Self {
        if count > 1 {
            self.position = Some((selected + 1, count));
        }
        self
    }

    pub fn loading(mut self, is_loading: bool) -> Self {
        self.is_loading = is_loading;
        self
    }

    pub fn streaming(mut self, is_streaming: bool) -> Self {
        self.is_streaming = is_streaming;
        self
    }

    pub fn status(mut self, message: &'a str) -> Self {
        self.status_message = Some(message);
        self
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style_label = Style::default().fg(Color::DarkGray);
        let style_value = Style::default().fg(Color::White);
        let style_busy = Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD);

        let mut spans = vec![
            Span::styled(
                format!(" {}", self.title),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" | Model: ", style_label),
            Span::styled(self.model_label, style_value),
        ];

        if let Some((index, count)) = self.position {
            spans.push(Span::styled(format!(" ({}/{})", index, count), style_label));
        }

        if self.is_loading {
            spans.push(Span::styled(" | ", style_label));
            spans.push(Span::styled("WAITING", style_busy));
        } else if self.is_streaming {
            spans.push(Span::styled(" | ", style_label));
            spans.push(Span::styled("STREAMING", style_busy));
        }

        if let Some(msg) = self.status_message {
            spans.push(Span::styled(" | ", style_label));
            spans.push(Span::styled(msg, Style::default().fg(Color::Yellow)));
        }

        let paragraph = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

        paragraph.render(area, buf);
    }
}
