//! Blocking notice shown while the inference server is unreachable.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

pub struct ServerNotice<'a> {
    url: &'a str,
    error: Option<&'a str>,
    probing: bool,
}

impl<'a> ServerNotice<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            error: None,
            probing: false,
        }
    }

    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    pub fn probing(mut self, probing: bool) -> Self {
        self.probing = probing;
        self
    }
}

impl Widget for ServerNotice<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let heading = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
        let body = Style::default().fg(Color::Gray);
        let dim = Style::default().fg(Color::DarkGray);

        let mut lines = vec![
            Line::from(Span::styled(
                "Warning",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled("Ollama is not active on your machine.", body)),
            Line::default(),
            Line::from(Span::styled("Is Ollama already installed on your machine?", heading)),
            Line::from(Span::styled(
                "Just open the application and make sure it runs in the background.",
                body,
            )),
            Line::default(),
            Line::from(Span::styled("Don't have Ollama installed?", heading)),
            Line::from(vec![
                Span::styled("You can download it from ", body),
                Span::styled(
                    "https://ollama.com/",
                    Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                ),
            ]),
            Line::default(),
            Line::from(Span::styled(format!("Tried {}", self.url), dim)),
        ];
        if let Some(error) = self.error {
            lines.push(Line::from(Span::styled(error.to_string(), dim)));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            if self.probing {
                "Checking..."
            } else {
                "Press r to retry, q to quit"
            },
            Style::default().fg(Color::Cyan),
        )));

        let height = (lines.len() as u16 + 2).min(area.height);
        let y = area.y + (area.height - height) / 2;
        let block_area = Rect::new(area.x, y, area.width, height);

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .render(block_area, buf);
    }
}
